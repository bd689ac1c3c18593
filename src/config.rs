//! Repository configuration.

use std::path::PathBuf;

/// Whether new blobs and patches are written compressed.
///
/// Only affects writes. Stored data records how it was written, so reads
/// never depend on this setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    Enabled,
    Disabled,
}

impl Compression {
    pub fn is_enabled(self) -> bool {
        matches!(self, Compression::Enabled)
    }
}

/// Repository configuration.
#[derive(Clone, Debug)]
pub struct RepositoryConfig {
    /// Metadata area, relative to the working-tree root.
    pub metadata_dir: String,

    /// Ignore file, relative to the working-tree root.
    pub ignore_file: String,

    /// Delta hops allowed before a modified file is checkpointed as a full
    /// blob. Zero disables forced checkpoints.
    pub max_chain_length: usize,

    /// Compression applied to new blobs and patches.
    pub compression: Compression,

    /// Entries kept by each object cache (decoded blobs, loaded delta sets).
    /// Zero disables caching.
    pub cache_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            metadata_dir: ".bit".to_string(),
            ignore_file: ".bitignore".to_string(),
            max_chain_length: 10,
            compression: Compression::Enabled,
            cache_size: 256,
        }
    }
}

impl RepositoryConfig {
    /// Path of the catalog document.
    pub fn catalog_path(&self) -> PathBuf {
        PathBuf::from(&self.metadata_dir).join("metadata.json")
    }

    /// Directory holding blobs and delta sets.
    pub fn objects_dir(&self) -> PathBuf {
        PathBuf::from(&self.metadata_dir).join("objects")
    }
}
