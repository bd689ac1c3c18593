//! Computing and replaying per-file deltas.

use super::script;
use crate::error::{Result, StoreError};
use crate::objects::decompress_hex;
use crate::types::{DeltaRecord, Hash, SaveId};

/// Describe how `path` went from `old` to `new`.
///
/// `old = None` records a new file, `new = None` a deleted one. Identical
/// contents produce a record with no patch.
pub fn compute_delta(
    old: Option<&[u8]>,
    new: Option<&[u8]>,
    path: &str,
    base_id: Option<&SaveId>,
) -> Result<DeltaRecord> {
    let record = |is_new, is_deleted, base_id: Option<&SaveId>, patch, hashed: &[u8]| DeltaRecord {
        path: path.to_string(),
        is_new,
        is_deleted,
        base_id: base_id.cloned(),
        patch,
        content_hash: Hash::from_bytes(hashed),
        compressed: false,
    };

    match (old, new) {
        (None, Some(new)) => Ok(record(true, false, None, None, new)),
        (Some(old), None) => Ok(record(false, true, base_id, None, old)),
        (Some(old), Some(new)) => Ok(record(false, false, base_id, script::diff(old, new), new)),
        (None, None) => Err(StoreError::InvalidOperation(format!(
            "delta for {} has neither old nor new content",
            path
        ))),
    }
}

/// Rebuild the content a delta describes.
///
/// `resolve(path, save_id)` supplies the content of a file at another save.
/// Returns `None` for deletions.
pub fn apply_delta(
    delta: &DeltaRecord,
    resolve: &dyn Fn(&str, &SaveId) -> Result<Vec<u8>>,
) -> Result<Option<Vec<u8>>> {
    if delta.is_deleted {
        return Ok(None);
    }

    // New files are always stored as full blobs at their own save, so the
    // resolver finds them before any delta is replayed. Reaching this point
    // means that blob is missing.
    let base_id = match (&delta.base_id, delta.is_new) {
        (Some(base_id), _) => base_id,
        (None, true) => {
            return Err(StoreError::Corruption(format!(
                "full blob for new file {} is missing",
                delta.path
            )))
        }
        (None, false) => {
            return Err(StoreError::Corruption(format!(
                "delta for {} has no base save",
                delta.path
            )))
        }
    };

    let base = resolve(&delta.path, base_id)?;
    if delta.is_new || !delta.has_patch() {
        return Ok(Some(base));
    }

    let patch = delta.patch.as_deref().unwrap_or_default();
    let text = if delta.compressed {
        decompress_hex(patch)?
    } else {
        patch.to_string()
    };

    let content = script::apply(&base, &text).map_err(|e| StoreError::Patch {
        path: delta.path.clone(),
        reason: e.to_string(),
    })?;

    let got = Hash::from_bytes(&content);
    if got != delta.content_hash {
        return Err(StoreError::HashMismatch {
            path: delta.path.clone(),
            expected: delta.content_hash,
            got,
        });
    }

    Ok(Some(content))
}
