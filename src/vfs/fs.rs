use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{FsError, FsResult};

use super::stack::DirHandle;
use super::types::{
    is_valid_name, join_path, split_path, CopyContent, Entry, EntryCopy, EntryId, EntryType,
    InodeTable, ROOT_PATH,
};

/// How [`VirtualFileSystem::write_file`] combines new text with existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    /// Appends on a new line unless the file is empty.
    Append,
}

/// An in-memory tree of files and directories with a current working directory.
///
/// Every path taken by the public methods is an absolute, already normalized
/// path. Turning user input into such a path is the job of
/// [`PathResolver`](crate::resolver::PathResolver).
#[derive(Debug)]
pub struct VirtualFileSystem {
    inodes: InodeTable,
    root: EntryId,
    current_path: String,
    current_directory: EntryId,
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualFileSystem {
    pub fn new() -> Self {
        let mut inodes = InodeTable::default();
        let root = inodes.allocate(Entry::root());

        Self {
            inodes,
            root,
            current_path: ROOT_PATH.to_string(),
            current_directory: root,
        }
    }

    /// Drops the whole tree and starts over with an empty root.
    ///
    /// Handles taken before the reset no longer resolve.
    pub fn reset(&mut self) {
        debug!("reset: live_entries={}", self.inodes.len());
        self.inodes.clear();
        self.root = self.inodes.allocate(Entry::root());
        self.current_path = ROOT_PATH.to_string();
        self.current_directory = self.root;
    }

    pub fn root(&self) -> EntryId {
        self.root
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Handle of the current directory, provided it still exists.
    pub fn current_directory(&self) -> FsResult<EntryId> {
        match self.inodes.get(self.current_directory) {
            Some(entry) if entry.is_directory() => Ok(self.current_directory),
            _ => Err(FsError::InvalidPath {
                path: self.current_path.clone(),
            }),
        }
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.inodes.get(id)
    }

    /// Walks the tree to `path`. Never fails, absent entries are `None`.
    pub fn lookup(&self, path: &str) -> Option<EntryId> {
        let (mut cursor, rest) = self.walk_start(path)?;
        if rest.is_empty() {
            return Some(cursor);
        }

        for segment in rest.split('/') {
            if segment.is_empty() {
                return None;
            }
            cursor = self.inodes.get(cursor)?.get_child(segment)?;
        }
        Some(cursor)
    }

    /// Picks where a walk to `path` begins and what is left to walk.
    ///
    /// Paths below the current directory start there when its handle is live
    /// and still sits at `current_path`, which gives the same answer as
    /// walking from the root.
    fn walk_start<'p>(&self, path: &'p str) -> Option<(EntryId, &'p str)> {
        let below_root = path.strip_prefix('/')?;

        if self.current_path != ROOT_PATH {
            let below_current = path
                .strip_prefix(self.current_path.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .filter(|rest| !rest.is_empty());
            let current_is_live = self
                .inodes
                .get(self.current_directory)
                .is_some_and(|entry| entry.is_directory() && entry.path() == self.current_path);

            if let (Some(rest), true) = (below_current, current_is_live) {
                return Some((self.current_directory, rest));
            }
        }

        Some((self.root, below_root))
    }

    pub fn path_exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.lookup(path)
            .and_then(|id| self.inodes.get(id))
            .is_some_and(Entry::is_directory)
    }

    /// Resolves `path` to an entry of any kind.
    pub fn resolve(&self, path: &str) -> FsResult<EntryId> {
        self.lookup(path).ok_or_else(|| FsError::InvalidPath {
            path: path.to_string(),
        })
    }

    /// Resolves `path` to a directory. A file anywhere along the way is an invalid path.
    pub fn resolve_directory(&self, path: &str) -> FsResult<EntryId> {
        match self.lookup(path) {
            Some(id) if self.inodes.get(id).is_some_and(Entry::is_directory) => Ok(id),
            _ => Err(FsError::InvalidPath {
                path: path.to_string(),
            }),
        }
    }

    pub fn get_entry(&self, path: &str) -> FsResult<&Entry> {
        let id = self.resolve(path)?;
        self.entry(id)
    }

    pub fn get_file(&self, path: &str) -> FsResult<&Entry> {
        self.get_typed(path, EntryType::File)
    }

    pub fn get_folder(&self, path: &str) -> FsResult<&Entry> {
        self.get_typed(path, EntryType::Directory)
    }

    fn get_typed(&self, path: &str, expected: EntryType) -> FsResult<&Entry> {
        let entry = self.get_entry(path)?;
        if entry.entry_type() != expected {
            return Err(FsError::WrongType {
                path: path.to_string(),
                expected,
            });
        }
        Ok(entry)
    }

    /// Directory holding `id`, found again from the entry's own path.
    pub fn get_parent(&self, id: EntryId) -> FsResult<EntryId> {
        let entry = self.entry(id)?;
        if id == self.root {
            return Err(FsError::InvalidPath {
                path: ROOT_PATH.to_string(),
            });
        }

        let (parent_path, _) = split_path(entry.path());
        self.resolve_directory(parent_path)
    }

    /// Live children of the directory `id`, in name order.
    pub fn children(&self, id: EntryId) -> impl Iterator<Item = &Entry> + '_ {
        self.inodes
            .get(id)
            .into_iter()
            .flat_map(|entry| entry.children())
            .filter_map(|(_, child)| self.inodes.get(child))
    }

    pub fn make_directory(&mut self, path: &str) -> FsResult<EntryId> {
        debug!("make_directory: path={}", path);
        self.create(path, EntryType::Directory)
    }

    pub fn make_file(&mut self, path: &str) -> FsResult<EntryId> {
        debug!("make_file: path={}", path);
        self.create(path, EntryType::File)
    }

    fn create(&mut self, path: &str, entry_type: EntryType) -> FsResult<EntryId> {
        let (parent_path, name) = split_path(path);
        let parent = self.resolve_directory(parent_path)?;

        if !is_valid_name(name) {
            return Err(FsError::InvalidName {
                name: name.to_string(),
            });
        }

        let path = join_path(parent_path, name);
        let entry = match entry_type {
            EntryType::File => Entry::file(name, path),
            EntryType::Directory => Entry::directory(name, path),
        };
        self.insert(parent, entry)
    }

    fn insert(&mut self, parent: EntryId, entry: Entry) -> FsResult<EntryId> {
        let name = entry.name().to_string();
        let parent_entry = self.entry(parent)?;
        if parent_entry.get_child(&name).is_some() {
            return Err(FsError::DuplicateName {
                parent: parent_entry.path().to_string(),
                name,
            });
        }

        let id = self.inodes.allocate(entry);
        let added = self.entry_mut(parent).and_then(|p| p.add_child(&name, id));
        if let Err(err) = added {
            self.inodes.release(id);
            return Err(err);
        }
        Ok(id)
    }

    pub fn change_directory(&mut self, path: &str) -> FsResult<()> {
        debug!("change_directory: path={}", path);
        let id = if path == ROOT_PATH {
            self.root
        } else {
            self.resolve_directory(path)?
        };

        self.enter(id)
    }

    /// Enters a directory remembered by handle, after checking it still exists.
    pub fn change_directory_to(&mut self, dir: &DirHandle) -> FsResult<()> {
        debug!("change_directory_to: id={}, last_path={}", dir.id(), dir.path());
        match self.inodes.get(dir.id()) {
            Some(entry) if entry.is_directory() => self.enter(dir.id()),
            _ => Err(FsError::InvalidPath {
                path: dir.path().to_string(),
            }),
        }
    }

    fn enter(&mut self, id: EntryId) -> FsResult<()> {
        let path = self.entry(id)?.path().to_string();
        self.current_directory = id;
        self.current_path = path;
        Ok(())
    }

    /// Handle on the current directory for the directory stack.
    pub fn current_handle(&self) -> DirHandle {
        DirHandle::new(self.current_directory, self.current_path.as_str())
    }

    pub fn read_file(&self, path: &str) -> FsResult<&str> {
        let entry = self.get_file(path)?;
        Ok(entry.data().unwrap_or_default())
    }

    pub fn write_file(&mut self, path: &str, text: &str, mode: WriteMode) -> FsResult<()> {
        debug!("write_file: path={}, mode={:?}, len={}", path, mode, text.len());
        let id = self.resolve(path)?;
        let data = self.entry_mut(id)?.data_mut()?;

        match mode {
            WriteMode::Overwrite => {
                data.clear();
                data.push_str(text);
            }
            WriteMode::Append => {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(text);
            }
        }
        Ok(())
    }

    /// Detached deep copy of the subtree at `id`.
    pub fn copy_entry(&self, id: EntryId) -> FsResult<EntryCopy> {
        let entry = self.entry(id)?;
        let content = match entry.data() {
            Some(data) => CopyContent::File(data.to_string()),
            None => CopyContent::Directory(
                entry
                    .children()
                    .map(|(_, child)| self.copy_entry(child))
                    .collect::<FsResult<Vec<_>>>()?,
            ),
        };

        Ok(EntryCopy::new(entry.name(), entry.path(), content))
    }

    /// Attaches a detached copy as a child of `parent`, rewriting its paths first.
    pub fn attach(&mut self, parent: EntryId, mut copy: EntryCopy) -> FsResult<EntryId> {
        let parent_entry = self.entry(parent)?;
        if !parent_entry.is_directory() {
            return Err(FsError::WrongType {
                path: parent_entry.path().to_string(),
                expected: EntryType::Directory,
            });
        }
        if parent_entry.get_child(copy.name()).is_some() {
            return Err(FsError::DuplicateName {
                parent: parent_entry.path().to_string(),
                name: copy.name().to_string(),
            });
        }

        let path = join_path(parent_entry.path(), copy.name());
        copy.change_path(&path);
        let name = copy.name().to_string();
        let id = self.materialize(copy);
        self.entry_mut(parent)?.add_child(&name, id)?;
        Ok(id)
    }

    fn materialize(&mut self, copy: EntryCopy) -> EntryId {
        let (name, path, content) = copy.into_parts();
        match content {
            CopyContent::File(data) => self.inodes.allocate(Entry::file_with_data(name, path, data)),
            CopyContent::Directory(children) => {
                let children: BTreeMap<String, EntryId> = children
                    .into_iter()
                    .map(|child| (child.name().to_string(), self.materialize(child)))
                    .collect();
                self.inodes
                    .allocate(Entry::directory_with_children(name, path, children))
            }
        }
    }

    /// Detaches the entry at `path` from its parent and frees its whole subtree.
    pub fn remove(&mut self, path: &str) -> FsResult<()> {
        debug!("remove: path={}", path);
        let id = self.resolve(path)?;
        let parent = self.get_parent(id)?;
        let name = self.entry(id)?.name().to_string();

        self.entry_mut(parent)?.remove_child(&name)?;
        self.release_subtree(id);
        Ok(())
    }

    fn release_subtree(&mut self, id: EntryId) {
        let children: Vec<EntryId> = self
            .inodes
            .get(id)
            .map(|entry| entry.children().map(|(_, child)| child).collect())
            .unwrap_or_default();

        for child in children {
            self.release_subtree(child);
        }
        self.inodes.release(id);
    }

    /// Copies the entry at `source` into the directory at `destination`.
    pub fn copy(&mut self, source: &str, destination: &str) -> FsResult<EntryId> {
        debug!("copy: source={}, destination={}", source, destination);
        check_not_into_itself(source, destination)?;

        let source_id = self.resolve(source)?;
        self.get_folder(destination)?;
        let destination_id = self.resolve(destination)?;

        let copy = self.copy_entry(source_id)?;
        self.attach(destination_id, copy)
    }

    /// Moves `source` into the directory `destination`, or renames it to
    /// `destination` when nothing exists there yet.
    pub fn move_entry(&mut self, source: &str, destination: &str) -> FsResult<EntryId> {
        debug!("move_entry: source={}, destination={}", source, destination);
        check_not_into_itself(source, destination)?;

        let source_id = self.resolve(source)?;
        let moved = match self.lookup(destination) {
            Some(dest) if self.inodes.get(dest).is_some_and(Entry::is_directory) => {
                let copy = self.copy_entry(source_id)?;
                let moved = self.attach(dest, copy)?;
                self.remove(source)?;
                moved
            }
            Some(_) => {
                return Err(FsError::WrongType {
                    path: destination.to_string(),
                    expected: EntryType::Directory,
                })
            }
            None => self.relocate(source_id, destination)?,
        };

        let new_path = self.entry(moved)?.path().to_string();
        self.follow_current_directory(source, &new_path);
        Ok(moved)
    }

    /// Renames an entry in place, re-keying it under the parent of `destination`.
    fn relocate(&mut self, id: EntryId, destination: &str) -> FsResult<EntryId> {
        let (parent_path, new_name) = split_path(destination);
        if !is_valid_name(new_name) {
            return Err(FsError::InvalidName {
                name: new_name.to_string(),
            });
        }

        let new_parent = self.resolve_directory(parent_path)?;
        let old_parent = self.get_parent(id)?;
        let old_name = self.entry(id)?.name().to_string();

        self.entry_mut(old_parent)?.remove_child(&old_name)?;
        let added = self.entry_mut(new_parent)?.add_child(new_name, id);
        if let Err(err) = added {
            self.entry_mut(old_parent)?.add_child(&old_name, id)?;
            return Err(err);
        }

        self.entry_mut(id)?.rename(new_name);
        self.change_path(id, &join_path(parent_path, new_name))?;
        Ok(id)
    }

    /// Sets the path of `id` and rewrites every descendant's path below it.
    pub fn change_path(&mut self, id: EntryId, path: &str) -> FsResult<()> {
        let entry = self.entry_mut(id)?;
        entry.set_path(path);
        let children: Vec<(String, EntryId)> = entry
            .children()
            .map(|(name, child)| (name.to_string(), child))
            .collect();

        for (name, child) in children {
            self.change_path(child, &join_path(path, &name))?;
        }
        Ok(())
    }

    /// Keeps the working directory attached to a subtree that moved from `old_base`.
    fn follow_current_directory(&mut self, old_base: &str, new_base: &str) {
        let Some(suffix) = self.current_path.strip_prefix(old_base) else {
            return;
        };
        if !suffix.is_empty() && !suffix.starts_with('/') {
            return;
        }

        let new_path = format!("{new_base}{suffix}");
        if let Some(id) = self.lookup(&new_path) {
            debug!("follow_current_directory: {} -> {}", self.current_path, new_path);
            self.current_directory = id;
            self.current_path = new_path;
        }
    }

    fn entry(&self, id: EntryId) -> FsResult<&Entry> {
        self.inodes.get(id).ok_or_else(|| stale(id))
    }

    fn entry_mut(&mut self, id: EntryId) -> FsResult<&mut Entry> {
        self.inodes.get_mut(id).ok_or_else(|| stale(id))
    }
}

fn stale(id: EntryId) -> FsError {
    FsError::InvalidPath {
        path: format!("<removed {id}>"),
    }
}

/// Rejects moving or copying the root, or a directory into itself or below itself.
fn check_not_into_itself(source: &str, destination: &str) -> FsResult<()> {
    let into_itself = source == ROOT_PATH
        || destination == source
        || destination
            .strip_prefix(source)
            .is_some_and(|rest| rest.starts_with('/'));

    if into_itself {
        return Err(FsError::InvalidPath {
            path: destination.to_string(),
        });
    }
    Ok(())
}
