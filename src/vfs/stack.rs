use crate::error::{FsError, FsResult};

use super::fs::VirtualFileSystem;
use super::types::{split_path, EntryId, ROOT_PATH};

/// Non-owning reference to a directory, remembered with the path it had when taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirHandle {
    id: EntryId,
    path: String,
}

impl DirHandle {
    pub fn new(id: EntryId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Path of the directory when the handle was taken.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn last_known_name(&self) -> &str {
        match split_path(&self.path) {
            (_, "") => ROOT_PATH,
            (_, name) => name,
        }
    }
}

/// LIFO of directories saved by `pushd`.
///
/// Handles are never validated here. Whoever pops one re-validates it against
/// the tree before entering it.
#[derive(Debug, Default, Clone)]
pub struct DirectoryStack {
    entries: Vec<DirHandle>,
}

impl DirectoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, dir: DirHandle) {
        self.entries.push(dir);
    }

    pub fn pop(&mut self) -> FsResult<DirHandle> {
        self.entries.pop().ok_or(FsError::EmptyStack)
    }

    pub fn peek(&self) -> FsResult<&DirHandle> {
        self.entries.last().ok_or(FsError::EmptyStack)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Directory names, most recently pushed first, one per line.
    pub fn render(&self, fs: &VirtualFileSystem) -> String {
        self.entries
            .iter()
            .rev()
            .map(|dir| {
                fs.get(dir.id)
                    .map(|entry| entry.name())
                    .unwrap_or_else(|| dir.last_known_name())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
