//! OS-backed filesystem rooted at a directory.

use super::{EntryKind, FileSystem, WalkControl};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Real filesystem, with every path resolved against `root`.
#[derive(Clone, Debug)]
pub struct OsFileSystem {
    root: PathBuf,
}

impl OsFileSystem {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl FileSystem for OsFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.full_path(path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(self.full_path(path), contents)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(self.full_path(path))
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(self.full_path(path))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(self.full_path(path))
    }

    fn metadata(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = fs::metadata(self.full_path(path))?;
        Ok(if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        })
    }

    fn walk(
        &self,
        root: &Path,
        visitor: &mut dyn FnMut(&Path, EntryKind) -> WalkControl,
    ) -> io::Result<()> {
        let mut entries = WalkDir::new(self.full_path(root))
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = entry.map_err(io::Error::from)?;
            let kind = if entry.file_type().is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());

            if visitor(relative, kind) == WalkControl::SkipSubtree && kind == EntryKind::Dir {
                entries.skip_current_dir();
            }
        }

        Ok(())
    }
}
