//! The save catalog: an append-only, chronologically ordered list of saves.
//!
//! Records carry metadata only. Each record's `base_id` points at the record
//! before it, so the history is a single linear chain.

mod log;

pub use log::{Catalog, SAVE_ID_LEN};
