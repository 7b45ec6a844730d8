//! Conversation thread storage for Parley.

pub mod file_backend;
pub mod in_memory;
pub mod store;

pub use file_backend::FileCheckpoints;
pub use in_memory::InMemoryCheckpoints;
pub use store::{ThreadStore, TurnGuard};

use parley_config::ThreadsConfig;
use parley_core::checkpoint::CheckpointBackend;
use std::sync::Arc;

/// Create the checkpoint backend selected by configuration.
///
/// Unknown names were already rejected by config validation; they fall back
/// to the in-memory backend here.
pub fn build_from_config(config: &ThreadsConfig) -> Arc<dyn CheckpointBackend> {
    match config.backend.as_str() {
        "file" => Arc::new(FileCheckpoints::new(config.resolved_path())),
        _ => Arc::new(InMemoryCheckpoints::new()),
    }
}
