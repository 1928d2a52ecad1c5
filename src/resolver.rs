use tracing::trace;

use crate::error::{FsError, FsResult};
use crate::vfs::types::ROOT_PATH;
use crate::vfs::VirtualFileSystem;

/// Read-only view of the tree that path normalization needs.
pub trait PathProbe {
    /// Absolute path of the working directory
    fn current_path(&self) -> &str;
    /// Whether anything exists at the absolute `path`
    fn path_exists(&self, path: &str) -> bool;
    /// Whether a directory exists at the absolute `path`
    fn is_directory(&self, path: &str) -> bool;
}

impl PathProbe for VirtualFileSystem {
    fn current_path(&self) -> &str {
        VirtualFileSystem::current_path(self)
    }

    fn path_exists(&self, path: &str) -> bool {
        VirtualFileSystem::path_exists(self, path)
    }

    fn is_directory(&self, path: &str) -> bool {
        VirtualFileSystem::is_directory(self, path)
    }
}

/// Outcome of normalizing a user-typed path token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// Canonical absolute path. It may or may not exist.
    Absolute(String),
    /// A `..` stepped out of a directory that does not exist. Holds the raw token.
    Unreachable(String),
}

impl ResolvedPath {
    pub fn as_str(&self) -> &str {
        match self {
            ResolvedPath::Absolute(path) | ResolvedPath::Unreachable(path) => path,
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, ResolvedPath::Absolute(_))
    }

    /// The absolute path, or an invalid path error for unreachable tokens.
    pub fn into_path(self) -> FsResult<String> {
        match self {
            ResolvedPath::Absolute(path) => Ok(path),
            ResolvedPath::Unreachable(token) => Err(FsError::InvalidPath { path: token }),
        }
    }
}

pub struct PathResolver;

impl PathResolver {
    /// Turns `token` into an absolute path against the live state of `probe`.
    ///
    /// `..` only collapses when the directory it leaves exists, so the same
    /// token can normalize differently as the tree changes.
    pub fn normalize<P: PathProbe + ?Sized>(probe: &P, token: &str) -> ResolvedPath {
        let path = Self::to_absolute(probe.current_path(), token);
        let path = Self::collapse_single_dots(path);
        let Some(mut path) = Self::collapse_double_dots(probe, path) else {
            trace!("normalize: {} is unreachable", token);
            return ResolvedPath::Unreachable(token.to_string());
        };

        if path.len() > 1 && path.ends_with('/') && probe.is_directory(&path[..path.len() - 1]) {
            path.pop();
        }

        if path.is_empty() {
            path.push_str(ROOT_PATH);
        }

        trace!("normalize: {} -> {}", token, path);
        ResolvedPath::Absolute(path)
    }

    fn to_absolute(current_path: &str, token: &str) -> String {
        if token.starts_with('/') {
            token.to_string()
        } else if current_path == ROOT_PATH {
            format!("/{token}")
        } else {
            format!("{current_path}/{token}")
        }
    }

    fn collapse_single_dots(mut path: String) -> String {
        while path.contains("/./") {
            path = path.replace("/./", "/");
        }
        if path.ends_with("/.") {
            path.truncate(path.len() - 2);
        }
        path
    }

    /// Removes each `/..` with the segment before it, front to back.
    ///
    /// `None` when the directory a `..` climbs out of does not exist.
    fn collapse_double_dots<P: PathProbe + ?Sized>(probe: &P, mut path: String) -> Option<String> {
        while let Some(at) = Self::find_parent_segment(&path) {
            if at == 0 {
                path.replace_range(..3, "");
                continue;
            }

            let subpath = &path[..at];
            if !probe.path_exists(subpath) {
                return None;
            }
            let start = subpath.rfind('/').unwrap_or(0);
            path.replace_range(start..at + 3, "");
        }
        Some(path)
    }

    /// Byte offset of the first `/..` that forms a whole segment.
    fn find_parent_segment(path: &str) -> Option<usize> {
        path.match_indices("/..")
            .map(|(at, _)| at)
            .find(|&at| matches!(path.as_bytes().get(at + 3), None | Some(b'/')))
    }
}
