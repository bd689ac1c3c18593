//! Working-tree enumeration.

use crate::error::{Result, StoreError};
use crate::fs::{to_slash, EntryKind, FileSystem, WalkControl};
use crate::ignore::{is_metadata_path, IgnoreRules};
use std::path::Path;

/// Every file in the tree, ignored ones included, outside the metadata area.
pub fn all_files(fs: &dyn FileSystem, metadata_dir: &str) -> Result<Vec<String>> {
    let mut files = Vec::new();

    fs.walk(Path::new(""), &mut |path, kind| {
        let path = to_slash(path);
        if is_metadata_path(&path, metadata_dir) {
            return WalkControl::SkipSubtree;
        }
        if kind == EntryKind::File {
            files.push(path);
        }
        WalkControl::Continue
    })
    .map_err(|e| StoreError::io(".", e))?;

    Ok(files)
}

/// Files a save should capture: everything not ignored, plus the ignore
/// file itself.
pub fn trackable_files(
    fs: &dyn FileSystem,
    metadata_dir: &str,
    ignore_file: &str,
    rules: &IgnoreRules,
) -> Result<Vec<String>> {
    let files = all_files(fs, metadata_dir)?;
    Ok(files
        .into_iter()
        .filter(|f| f == ignore_file || !rules.is_ignored(f))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn tree() -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.insert(".bit/metadata.json", "{}");
        fs.insert(".bit/objects/abc/a.txt", "blob");
        fs.insert(".bitignore", "*.log\n");
        fs.insert("a.txt", "a");
        fs.insert("logs/run.log", "noise");
        fs.insert("src/main.rs", "fn main() {}");
        fs
    }

    #[test]
    fn test_all_files_skips_metadata() {
        let fs = tree();
        let files = all_files(&fs, ".bit").unwrap();
        assert_eq!(
            files,
            vec![".bitignore", "a.txt", "logs/run.log", "src/main.rs"]
        );
    }

    #[test]
    fn test_trackable_files_respect_rules() {
        let fs = tree();
        let rules = IgnoreRules::compile("*.log\n.bitignore\n").unwrap();
        let files = trackable_files(&fs, ".bit", ".bitignore", &rules).unwrap();
        assert_eq!(files, vec![".bitignore", "a.txt", "src/main.rs"]);
    }
}
