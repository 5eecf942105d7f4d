//! CLI command handlers, one per file.

mod hash;
mod manifest;
mod ping;
mod progress;
mod verify;

pub use hash::run_hash;
pub use manifest::run_manifest;
pub use ping::run_ping;
pub use verify::run_verify;
