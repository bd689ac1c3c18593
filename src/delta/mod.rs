//! Delta computation and replay.
//!
//! Each save records, per file, how the content changed relative to the
//! previous save. Reading a file replays those records back to the nearest
//! full blob; periodic checkpoints keep that walk short.

mod engine;
mod resolver;
mod script;

pub use engine::{apply_delta, compute_delta};
pub use resolver::Resolver;
pub use script::ScriptError;
