pub mod fs;
pub mod stack;
pub mod types;

pub use fs::{VirtualFileSystem, WriteMode};
pub use stack::{DirHandle, DirectoryStack};
pub use types::{Entry, EntryCopy, EntryId, EntryKind, EntryType};
