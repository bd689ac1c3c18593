//! Self-describing blob frame.
//!
//! Layout: `[u32 BE header length][JSON header][payload]`. The header records
//! whether the payload is compressed and the hash of the decoded content, so
//! a blob can be read back without knowing how it was written.

use super::compression;
use crate::config::Compression;
use crate::error::{Result, StoreError};
use crate::types::Hash;
use serde::{Deserialize, Serialize};

/// Size of the header-length prefix.
const LENGTH_PREFIX: usize = 4;

/// Headers at or above this size are taken to mean "not a framed blob".
const MAX_HEADER_LEN: usize = 1024;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobHeader {
    compressed: bool,
    content_hash: Hash,
}

/// Frame `content` for storage.
pub fn encode(content: &[u8], compression: Compression) -> Result<Vec<u8>> {
    let header = BlobHeader {
        compressed: compression.is_enabled(),
        content_hash: Hash::from_bytes(content),
    };
    let header_bytes = serde_json::to_vec(&header)?;

    let payload = if header.compressed {
        compression::compress(content)?
    } else {
        content.to_vec()
    };

    let mut framed = Vec::with_capacity(LENGTH_PREFIX + header_bytes.len() + payload.len());
    framed.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    framed.extend_from_slice(&header_bytes);
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// Decode a stored blob, verifying its hash.
///
/// Bytes without a usable header are returned unchanged.
pub fn decode(raw: Vec<u8>, path: &str) -> Result<Vec<u8>> {
    let Some((header, payload)) = parse_header(&raw) else {
        tracing::warn!(path, "blob has no frame header, returning raw bytes");
        return Ok(raw);
    };

    let content = if header.compressed {
        compression::decompress(payload)
            .map_err(|e| StoreError::Corruption(format!("{}: {}", path, e)))?
    } else {
        payload.to_vec()
    };

    let got = Hash::from_bytes(&content);
    if got != header.content_hash {
        return Err(StoreError::HashMismatch {
            path: path.to_string(),
            expected: header.content_hash,
            got,
        });
    }

    Ok(content)
}

fn parse_header(raw: &[u8]) -> Option<(BlobHeader, &[u8])> {
    let prefix: [u8; LENGTH_PREFIX] = raw.get(..LENGTH_PREFIX)?.try_into().ok()?;
    let header_len = u32::from_be_bytes(prefix) as usize;
    if header_len == 0 || header_len >= MAX_HEADER_LEN {
        return None;
    }

    let header_end = LENGTH_PREFIX + header_len;
    let header_bytes = raw.get(LENGTH_PREFIX..header_end)?;
    let header: BlobHeader = serde_json::from_slice(header_bytes).ok()?;
    Some((header, &raw[header_end..]))
}
