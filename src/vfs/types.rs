use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{FsError, FsResult};

pub const ROOT_PATH: &str = "/";

/// Characters no entry name may contain.
pub static INVALID_NAME_CHARS: [char; 24] = [
    '/', '!', '@', '$', '&', '*', '(', ')', '?', ':', '[', ']', '"', '<', '>', '\'', '`', '|', '=',
    '{', '}', '\\', ',', ';',
];

/// Whether `name` can label an entry.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_control() || INVALID_NAME_CHARS.contains(&c))
}

/// Path of the child `name` inside the directory at `parent`.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == ROOT_PATH {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Splits an absolute path into its parent path and final segment.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => (ROOT_PATH, &path[1..]),
        Some(i) => (&path[..i], &path[i + 1..]),
        None => (ROOT_PATH, path),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    File,
    Directory,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::File => f.write_str("file"),
            EntryType::Directory => f.write_str("directory"),
        }
    }
}

/// Generation-checked handle to an entry in an [`InodeTable`].
///
/// A handle outlives the entry it names: once the slot is released the
/// generation moves on and the handle stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    index: usize,
    generation: u32,
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inode {} (generation {})", self.index, self.generation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File { data: String },
    Directory { children: BTreeMap<String, EntryId> },
}

/// A named node of the tree. Entries compare and order by name only.
#[derive(Debug, Clone)]
pub struct Entry {
    name: String,
    path: String,
    kind: EntryKind,
}

impl Entry {
    pub fn root() -> Self {
        Self::directory(ROOT_PATH, ROOT_PATH)
    }

    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::file_with_data(name, path, String::new())
    }

    pub fn file_with_data(
        name: impl Into<String>,
        path: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: EntryKind::File { data: data.into() },
        }
    }

    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::directory_with_children(name, path, BTreeMap::new())
    }

    pub(crate) fn directory_with_children(
        name: impl Into<String>,
        path: impl Into<String>,
        children: BTreeMap<String, EntryId>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: EntryKind::Directory { children },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    pub fn entry_type(&self) -> EntryType {
        match self.kind {
            EntryKind::File { .. } => EntryType::File,
            EntryKind::Directory { .. } => EntryType::Directory,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.entry_type() == EntryType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.entry_type() == EntryType::File
    }

    /// Text held by a file, `None` for directories.
    pub fn data(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::File { data } => Some(data.as_str()),
            EntryKind::Directory { .. } => None,
        }
    }

    pub fn data_mut(&mut self) -> FsResult<&mut String> {
        match &mut self.kind {
            EntryKind::File { data } => Ok(data),
            EntryKind::Directory { .. } => Err(FsError::WrongType {
                path: self.path.clone(),
                expected: EntryType::File,
            }),
        }
    }

    /// Replaces the name only. The path is fixed separately.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Replaces this entry's own path. Descendants are rewritten by the owner of the tree.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn add_child(&mut self, name: &str, id: EntryId) -> FsResult<()> {
        let EntryKind::Directory { children } = &mut self.kind else {
            return Err(FsError::WrongType {
                path: self.path.clone(),
                expected: EntryType::Directory,
            });
        };
        if children.contains_key(name) {
            return Err(FsError::DuplicateName {
                parent: self.path.clone(),
                name: name.to_string(),
            });
        }
        children.insert(name.to_string(), id);
        Ok(())
    }

    pub fn remove_child(&mut self, name: &str) -> FsResult<EntryId> {
        let EntryKind::Directory { children } = &mut self.kind else {
            return Err(FsError::WrongType {
                path: self.path.clone(),
                expected: EntryType::Directory,
            });
        };
        children.remove(name).ok_or_else(|| FsError::NotFound {
            parent: self.path.clone(),
            name: name.to_string(),
        })
    }

    pub fn get_child(&self, name: &str) -> Option<EntryId> {
        match &self.kind {
            EntryKind::Directory { children } => children.get(name).copied(),
            EntryKind::File { .. } => None,
        }
    }

    /// Children in name order. Files have none.
    pub fn children(&self) -> impl Iterator<Item = (&str, EntryId)> + '_ {
        let children = match &self.kind {
            EntryKind::Directory { children } => Some(children),
            EntryKind::File { .. } => None,
        };
        children
            .into_iter()
            .flatten()
            .map(|(name, id)| (name.as_str(), *id))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Arena owning every live entry of a tree.
///
/// Released slots are recycled through a free list. Each release bumps the
/// slot generation so stale [`EntryId`]s never alias a newer entry.
#[derive(Debug, Default)]
pub struct InodeTable {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl InodeTable {
    pub fn allocate(&mut self, entry: Entry) -> EntryId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.entry = Some(entry);
            return EntryId {
                index,
                generation: slot.generation,
            };
        }

        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        EntryId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    pub fn release(&mut self, id: EntryId) -> Option<Entry> {
        let slot = self
            .slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(entry)
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every live entry, keeping slot generations so old handles stay stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entry.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
    }
}

/// Detached deep copy of an entry subtree.
///
/// Built by [`VirtualFileSystem::copy_entry`](super::fs::VirtualFileSystem::copy_entry),
/// so sibling names inside a copied directory are always unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryCopy {
    name: String,
    path: String,
    content: CopyContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyContent {
    File(String),
    Directory(Vec<EntryCopy>),
}

impl EntryCopy {
    pub(crate) fn new(name: impl Into<String>, path: impl Into<String>, content: CopyContent) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            content,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &CopyContent {
        &self.content
    }

    pub fn entry_type(&self) -> EntryType {
        match self.content {
            CopyContent::File(_) => EntryType::File,
            CopyContent::Directory(_) => EntryType::Directory,
        }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Sets the path of the copy and rewrites every descendant below it.
    pub fn change_path(&mut self, path: &str) {
        self.path = path.to_string();
        if let CopyContent::Directory(children) = &mut self.content {
            for child in children {
                let child_path = join_path(path, &child.name);
                child.change_path(&child_path);
            }
        }
    }

    /// Names, contents and child sets match, paths ignored.
    pub fn same_shape(&self, other: &EntryCopy) -> bool {
        if self.name != other.name {
            return false;
        }
        match (&self.content, &other.content) {
            (CopyContent::File(a), CopyContent::File(b)) => a == b,
            (CopyContent::Directory(a), CopyContent::Directory(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
            }
            _ => false,
        }
    }

    pub(crate) fn into_parts(self) -> (String, String, CopyContent) {
        (self.name, self.path, self.content)
    }
}
