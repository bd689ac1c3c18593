//! # bitsave
//!
//! A snapshot store for a working tree: save every tracked file under an
//! identifier, list saves, and check any of them back out.
//!
//! ## Core Concepts
//!
//! - **Saves**: Linear, chronologically ordered catalog entries with a full
//!   file manifest each
//! - **Deltas**: Per-file line edit scripts against the previous save
//! - **Blobs**: Self-verifying full copies, written for new files and as
//!   periodic checkpoints that bound delta chains
//! - **Checkout**: Converges the tree onto a save while ignored files stay
//!   exactly as they were
//!
//! ## Example
//!
//! ```ignore
//! use bitsave::{OsFileSystem, Repository, RepositoryConfig};
//! use std::sync::Arc;
//!
//! let fs = Arc::new(OsFileSystem::new("./project"));
//! let mut repo = Repository::init(fs, RepositoryConfig::default())?;
//!
//! let first = repo.save("initial import")?;
//! // ... edit files ...
//! repo.save("second pass")?;
//!
//! repo.checkout(&first)?;
//! ```

pub mod catalog;
pub mod checkout;
pub mod config;
pub mod delta;
pub mod error;
pub mod fs;
pub mod ignore;
pub mod objects;
pub mod store;
pub mod types;
pub mod worktree;

// Re-exports
pub use catalog::Catalog;
pub use checkout::{CheckoutPlan, CheckoutReport, Reconciler};
pub use config::{Compression, RepositoryConfig};
pub use delta::{apply_delta, compute_delta, Resolver};
pub use error::{Result, StoreError};
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use ignore::IgnoreRules;
pub use objects::ObjectStore;
pub use store::Repository;
pub use types::*;
