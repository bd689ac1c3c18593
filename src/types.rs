//! Core types for the snapshot store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier of a save: a truncated hex digest of its catalog position, label,
/// time and manifest.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaveId(pub String);

impl SaveId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SaveId {
    fn from(s: &str) -> Self {
        SaveId(s.to_string())
    }
}

impl From<String> for SaveId {
    fn from(s: String) -> Self {
        SaveId(s)
    }
}

impl fmt::Debug for SaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SaveId({})", self.0)
    }
}

impl fmt::Display for SaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content hash (SHA-256).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Compute hash from bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Hash(hasher.finalize().into())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Hash(arr))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// Hashes live in JSON documents, so they travel as hex strings.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// One completed snapshot in the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    /// Content-derived identifier.
    pub id: SaveId,

    /// User-supplied name.
    pub label: String,

    /// When the save was taken; never earlier than the previous record.
    pub created_at: DateTime<Utc>,

    /// Complete manifest of tracked paths (forward-slash, relative to the root).
    pub files: Vec<String>,

    /// The previous record in the catalog. Absent only for the first save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_id: Option<SaveId>,
}

impl SaveRecord {
    /// Whether `path` is part of this save's manifest.
    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|f| f == path)
    }
}

/// Listing view of a save.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveSummary {
    pub id: SaveId,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub file_count: usize,
    pub base_id: Option<SaveId>,
}

impl From<&SaveRecord> for SaveSummary {
    fn from(record: &SaveRecord) -> Self {
        Self {
            id: record.id.clone(),
            label: record.label.clone(),
            created_at: record.created_at,
            file_count: record.files.len(),
            base_id: record.base_id.clone(),
        }
    }
}

/// How one file changed in one save, relative to the save's base.
///
/// `is_new` and `is_deleted` are exclusive. With both false the file is
/// modified when `patch` is present and unmodified otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaRecord {
    pub path: String,

    #[serde(default)]
    pub is_new: bool,

    #[serde(default)]
    pub is_deleted: bool,

    /// Save the patch is expressed against. Absent for new files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_id: Option<SaveId>,

    /// Encoded edit script (hex gzip when `compressed`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,

    /// Hash of the resulting content, or of the removed content for deletions.
    pub content_hash: Hash,

    /// Whether `patch` currently holds compressed text.
    #[serde(default)]
    pub compressed: bool,
}

impl DeltaRecord {
    /// A real patch that must be replayed, as opposed to new/deleted/unmodified.
    pub fn has_patch(&self) -> bool {
        self.patch.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// All delta records written for one save.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaSet {
    pub save_id: SaveId,
    pub deltas: Vec<DeltaRecord>,
}

impl DeltaSet {
    /// Find the record for a path.
    pub fn find(&self, path: &str) -> Option<&DeltaRecord> {
        self.deltas.iter().find(|d| d.path == path)
    }
}

/// Kind of change a save recorded for a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Unchanged,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Unchanged => "unchanged",
            ChangeKind::Deleted => "deleted",
        };
        f.pad(s)
    }
}

/// A file and how it changed in a save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

impl From<&DeltaRecord> for FileChange {
    fn from(delta: &DeltaRecord) -> Self {
        let kind = if delta.is_new {
            ChangeKind::Added
        } else if delta.is_deleted {
            ChangeKind::Deleted
        } else if delta.has_patch() {
            ChangeKind::Modified
        } else {
            ChangeKind::Unchanged
        };
        Self {
            path: delta.path.clone(),
            kind,
        }
    }
}
