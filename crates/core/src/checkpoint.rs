//! Checkpoint backend trait — where thread transcripts are persisted.

use crate::error::ThreadError;
use crate::message::{ConversationState, ThreadId};
use async_trait::async_trait;

/// Persistence for [`ConversationState`] snapshots, keyed by thread.
///
/// `save` replaces whatever was stored for the thread before.
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>, ThreadError>;

    async fn save(&self, state: &ConversationState) -> Result<(), ThreadError>;

    /// Returns whether anything was removed.
    async fn delete(&self, thread_id: &ThreadId) -> Result<bool, ThreadError>;

    async fn list(&self) -> Result<Vec<ThreadId>, ThreadError>;
}
