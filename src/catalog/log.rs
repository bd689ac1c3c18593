//! Catalog implementation.

use crate::error::{Result, StoreError};
use crate::fs::FileSystem;
use crate::types::{SaveId, SaveRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Number of hex characters kept from the digest for a save id.
pub const SAVE_ID_LEN: usize = 12;

/// On-disk catalog document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogDocument {
    saves: Vec<SaveRecord>,
}

/// Append-only list of saves, persisted as one JSON document.
#[derive(Debug)]
pub struct Catalog {
    /// Path of the catalog document.
    path: PathBuf,

    /// Records in creation order.
    records: Vec<SaveRecord>,

    /// Position of each record by id.
    index: HashMap<SaveId, usize>,
}

impl Catalog {
    /// Create an empty catalog that will persist to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Load the catalog document. A missing document is an empty catalog.
    pub fn load(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match fs.read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new(path)),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let document: CatalogDocument = serde_json::from_slice(&data)
            .map_err(|e| StoreError::Deserialization(format!("catalog: {}", e)))?;

        let mut index = HashMap::with_capacity(document.saves.len());
        for (i, record) in document.saves.iter().enumerate() {
            index.entry(record.id.clone()).or_insert(i);
        }

        Ok(Self {
            path,
            records: document.saves,
            index,
        })
    }

    /// Write the whole catalog back to disk.
    pub fn persist(&self, fs: &dyn FileSystem) -> Result<()> {
        let document = CatalogDocument {
            saves: self.records.clone(),
        };
        let data = serde_json::to_vec_pretty(&document)?;
        fs.write(&self.path, &data)
            .map_err(|e| StoreError::io(&self.path, e))
    }

    /// Derive the id for the next save from its label, time and manifest.
    ///
    /// The catalog length is hashed in as well, so two saves with the same
    /// label, manifest and (clamped) time still get distinct ids.
    pub fn next_id(&self, label: &str, created_at: DateTime<Utc>, files: &[String]) -> SaveId {
        let mut hasher = Sha256::new();
        hasher.update((self.records.len() as u64).to_be_bytes());
        hasher.update(label.as_bytes());
        hasher.update(created_at.to_rfc3339().as_bytes());
        for file in files {
            hasher.update(file.as_bytes());
        }
        let digest = hex::encode(hasher.finalize());
        SaveId(digest[..SAVE_ID_LEN].to_string())
    }

    /// Append a record. It must link to the current latest record and must
    /// not predate it.
    pub fn append(&mut self, record: SaveRecord) -> Result<()> {
        let latest = self.records.last();

        let expected_base = latest.map(|r| &r.id);
        if record.base_id.as_ref() != expected_base {
            return Err(StoreError::InvalidOperation(format!(
                "save {} has base {:?}, expected {:?}",
                record.id, record.base_id, expected_base
            )));
        }
        if let Some(latest) = latest {
            if record.created_at < latest.created_at {
                return Err(StoreError::InvalidOperation(format!(
                    "save {} predates the latest save {}",
                    record.id, latest.id
                )));
            }
        }
        if self.index.contains_key(&record.id) {
            return Err(StoreError::InvalidOperation(format!(
                "save id {} already exists",
                record.id
            )));
        }

        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Find a record by id.
    pub fn find(&self, id: &SaveId) -> Result<&SaveRecord> {
        self.index
            .get(id)
            .map(|&i| &self.records[i])
            .ok_or_else(|| StoreError::SaveNotFound(id.clone()))
    }

    /// The most recent record.
    pub fn latest(&self) -> Option<&SaveRecord> {
        self.records.last()
    }

    /// All records in creation order.
    pub fn all(&self) -> &[SaveRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
