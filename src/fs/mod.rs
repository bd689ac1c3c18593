//! Filesystem abstraction.
//!
//! Everything the repository touches goes through [`FileSystem`], with paths
//! relative to the working-tree root. [`OsFileSystem`] is backed by a real
//! directory; [`MemoryFileSystem`] keeps the whole tree in memory for tests.

mod memory;
mod os;

pub use memory::MemoryFileSystem;
pub use os::OsFileSystem;

use std::io;
use std::path::{Component, Path};

/// What a path points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// Returned by a walk visitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    /// Do not descend into this directory. Ignored for files.
    SkipSubtree,
}

/// Filesystem primitives the repository depends on.
pub trait FileSystem: Send + Sync {
    /// Read a whole file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or truncate a file. The parent directory must exist.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Remove a file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Create a directory and all missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Stat a path.
    fn metadata(&self, path: &Path) -> io::Result<EntryKind>;

    /// Whether anything exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }

    /// Visit every entry below `root` (not `root` itself) in sorted order.
    fn walk(
        &self,
        root: &Path,
        visitor: &mut dyn FnMut(&Path, EntryKind) -> WalkControl,
    ) -> io::Result<()>;
}

/// Render a relative path with forward slashes, dropping `.` components.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
