//! In-memory filesystem.

use super::{EntryKind, FileSystem, WalkControl};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Default)]
struct MemoryTree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl MemoryTree {
    fn is_dir(&self, path: &Path) -> bool {
        path.as_os_str().is_empty() || self.dirs.contains(path)
    }
}

/// A filesystem that lives entirely in memory.
///
/// Behaves like the OS for the operations the repository uses: writes need
/// an existing parent directory and missing paths report `NotFound`.
#[derive(Default)]
pub struct MemoryFileSystem {
    tree: RwLock<MemoryTree>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a file, creating parent directories first.
    pub fn insert(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        let path = normalize(path.as_ref());
        let mut tree = self.tree.write();
        let mut current = PathBuf::new();
        if let Some(parent) = path.parent() {
            for component in parent.components() {
                current.push(component);
                tree.dirs.insert(current.clone());
            }
        }
        tree.files.insert(path, contents.as_ref().to_vec());
    }

    /// Overwrite part of an existing file, for corruption tests.
    pub fn corrupt(&self, path: impl AsRef<Path>, offset_from_end: usize) -> bool {
        let path = normalize(path.as_ref());
        let mut tree = self.tree.write();
        match tree.files.get_mut(&path) {
            Some(bytes) if offset_from_end > 0 && offset_from_end <= bytes.len() => {
                let idx = bytes.len() - offset_from_end;
                bytes[idx] ^= 0xff;
                true
            }
            _ => false,
        }
    }

    /// Every file path, sorted.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.tree.read().files.keys().cloned().collect()
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = normalize(path);
        self.tree
            .read()
            .files
            .get(&path)
            .cloned()
            .ok_or_else(|| not_found(&path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let path = normalize(path);
        let mut tree = self.tree.write();

        if tree.is_dir(&path) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            ));
        }
        let parent = path.parent().unwrap_or(Path::new(""));
        if !tree.is_dir(parent) {
            return Err(not_found(parent));
        }

        tree.files.insert(path, contents.to_vec());
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        self.tree
            .write()
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| not_found(&path))
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut tree = self.tree.write();
        if path.as_os_str().is_empty() || !tree.dirs.contains(&path) {
            return Err(not_found(&path));
        }

        let occupied = tree.files.keys().any(|f| f.starts_with(&path))
            || tree.dirs.iter().any(|d| d != &path && d.starts_with(&path));
        if occupied {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is not empty", path.display()),
            ));
        }

        tree.dirs.remove(&path);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut tree = self.tree.write();
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            if tree.files.contains_key(&current) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is a file", current.display()),
                ));
            }
            tree.dirs.insert(current.clone());
        }
        Ok(())
    }

    fn metadata(&self, path: &Path) -> io::Result<EntryKind> {
        let path = normalize(path);
        let tree = self.tree.read();
        if tree.files.contains_key(&path) {
            Ok(EntryKind::File)
        } else if tree.is_dir(&path) {
            Ok(EntryKind::Dir)
        } else {
            Err(not_found(&path))
        }
    }

    fn walk(
        &self,
        root: &Path,
        visitor: &mut dyn FnMut(&Path, EntryKind) -> WalkControl,
    ) -> io::Result<()> {
        let root = normalize(root);

        // Snapshot first so the visitor may not observe its own writes.
        let entries: BTreeMap<PathBuf, EntryKind> = {
            let tree = self.tree.read();
            if !tree.is_dir(&root) {
                return Err(not_found(&root));
            }
            tree.dirs
                .iter()
                .map(|d| (d.clone(), EntryKind::Dir))
                .chain(tree.files.keys().map(|f| (f.clone(), EntryKind::File)))
                .filter(|(p, _)| p.starts_with(&root) && *p != root)
                .collect()
        };

        let mut skipped: Vec<PathBuf> = Vec::new();
        for (path, kind) in entries {
            if skipped.iter().any(|s| path.starts_with(s)) {
                continue;
            }
            if visitor(&path, kind) == WalkControl::SkipSubtree && kind == EntryKind::Dir {
                skipped.push(path);
            }
        }

        Ok(())
    }
}
