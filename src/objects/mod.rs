//! Object storage for full-content blobs and per-save delta sets.
//!
//! Blobs are keyed by (save id, path) and framed with a header that records
//! compression and a content hash, so they verify themselves on read.

mod compression;
mod frame;
mod store;

pub use compression::{compress, compress_to_hex, decompress, decompress_hex};
pub use store::ObjectStore;
