//! Ignore file parsing and matching.
//!
//! Rules, one per line: blank lines and `#` comments are skipped, a trailing
//! `/` roots the pattern at a directory, and a pattern without `/` matches
//! the file name anywhere in the tree.

use crate::error::{Result, StoreError};
use crate::fs::FileSystem;
use glob::Pattern;
use std::io;
use std::path::Path;

/// Compiled ignore patterns.
#[derive(Clone, Debug, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    /// Compile the text of an ignore file.
    pub fn compile(text: &str) -> Result<Self> {
        let mut patterns = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut pattern = line.to_string();
            if pattern.ends_with('/') {
                pattern.push_str("**");
            }
            if !pattern.contains('/') {
                pattern = format!("**/{}", pattern);
            }

            let compiled = Pattern::new(&pattern).map_err(|e| StoreError::InvalidIgnorePattern {
                pattern: line.to_string(),
                reason: e.to_string(),
            })?;
            patterns.push(compiled);
        }

        Ok(Self { patterns })
    }

    /// Load rules from the ignore file. A missing file means no rules.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        match fs.read(path) {
            Ok(bytes) => Self::compile(&String::from_utf8_lossy(&bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Whether a relative path matches any rule.
    pub fn is_ignored(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        let dotted = format!("./{}", normalized);

        self.patterns
            .iter()
            .any(|p| p.matches(&normalized) || p.matches(&dotted))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

/// Whether a relative path is the metadata area or lies inside it.
pub fn is_metadata_path(path: &str, metadata_dir: &str) -> bool {
    let path = path.trim_start_matches("./");
    path == metadata_dir
        || path
            .strip_prefix(metadata_dir)
            .is_some_and(|rest| rest.starts_with('/'))
}
