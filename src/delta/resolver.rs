//! Recursive content resolution across delta chains.

use super::engine::apply_delta;
use crate::catalog::Catalog;
use crate::error::{Result, StoreError};
use crate::objects::ObjectStore;
use crate::types::SaveId;

/// Reconstructs file contents at any save.
///
/// A full blob at the requested save short-circuits everything. Otherwise the
/// save's delta record for the file is replayed on top of the content at its
/// base save, recursively, until a blob is reached.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    objects: &'a ObjectStore,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog, objects: &'a ObjectStore) -> Self {
        Self { catalog, objects }
    }

    /// Content of `path` as of `save_id`.
    pub fn resolve(&self, path: &str, save_id: &SaveId) -> Result<Vec<u8>> {
        self.resolve_at(path, save_id, 0)
    }

    fn resolve_at(&self, path: &str, save_id: &SaveId, hops: usize) -> Result<Vec<u8>> {
        if self.objects.has_blob(save_id, path) {
            return self.objects.get_blob(save_id, path);
        }

        // Bases always point at earlier saves, so a longer walk means the
        // catalog links form a cycle.
        if hops > self.catalog.len() {
            return Err(StoreError::ChainTooLong {
                save_id: save_id.clone(),
                path: path.to_string(),
                hops,
            });
        }

        let save = self.catalog.find(save_id)?;
        let record = self
            .objects
            .find_delta(&save.id, path)?
            .ok_or_else(|| StoreError::DeltaNotFound {
                save_id: save_id.clone(),
                path: path.to_string(),
            })?;

        let content = apply_delta(&record, &|p, base| self.resolve_at(p, base, hops + 1))?;
        content.ok_or_else(|| StoreError::FileNotInSave {
            save_id: save_id.clone(),
            path: path.to_string(),
        })
    }

    /// Delta hops between `save_id` and the nearest save holding a full blob
    /// of `path`. Zero when `save_id` itself holds one.
    ///
    /// The walk stops early at a save missing from the catalog.
    pub fn chain_length(&self, path: &str, save_id: &SaveId) -> usize {
        let mut current = Some(save_id.clone());
        let mut count = 0;

        while let Some(id) = current {
            if self.objects.has_blob(&id, path) || count > self.catalog.len() {
                break;
            }
            match self.catalog.find(&id) {
                Ok(save) => {
                    current = save.base_id.clone();
                    count += 1;
                }
                Err(_) => break,
            }
        }

        count
    }
}
