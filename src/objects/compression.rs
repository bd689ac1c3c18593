//! Gzip compression for blobs and patches.

use crate::error::{Result, StoreError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

/// Gzip `content`.
pub fn compress(content: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(content)
        .map_err(|e| StoreError::Serialization(format!("Failed to compress content: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| StoreError::Serialization(format!("Failed to finish compression: {}", e)))
}

/// Inflate a gzip stream. Failure means the stored bytes are damaged.
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| StoreError::Corruption(format!("Failed to decompress content: {}", e)))?;
    Ok(out)
}

/// Gzip text and hex-encode it so it can sit inside a JSON document.
pub fn compress_to_hex(text: &str) -> Result<String> {
    Ok(hex::encode(compress(text.as_bytes())?))
}

/// Reverse of [`compress_to_hex`].
pub fn decompress_hex(encoded: &str) -> Result<String> {
    let bytes = hex::decode(encoded)
        .map_err(|e| StoreError::Corruption(format!("Invalid hex in compressed patch: {}", e)))?;
    let inflated = decompress(&bytes)?;
    String::from_utf8(inflated)
        .map_err(|e| StoreError::Corruption(format!("Compressed patch is not UTF-8: {}", e)))
}
