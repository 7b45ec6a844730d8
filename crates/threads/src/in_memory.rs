//! In-memory checkpoints — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use parley_core::checkpoint::CheckpointBackend;
use parley_core::error::ThreadError;
use parley_core::message::{ConversationState, ThreadId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps every thread's latest state in a map. Nothing survives the process.
pub struct InMemoryCheckpoints {
    states: Arc<RwLock<HashMap<ThreadId, ConversationState>>>,
}

impl InMemoryCheckpoints {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryCheckpoints {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointBackend for InMemoryCheckpoints {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>, ThreadError> {
        Ok(self.states.read().await.get(thread_id).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<(), ThreadError> {
        self.states
            .write()
            .await
            .insert(state.thread_id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &ThreadId) -> Result<bool, ThreadError> {
        Ok(self.states.write().await.remove(thread_id).is_some())
    }

    async fn list(&self) -> Result<Vec<ThreadId>, ThreadError> {
        let mut ids: Vec<ThreadId> = self.states.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::Message;

    #[tokio::test]
    async fn save_and_load() {
        let backend = InMemoryCheckpoints::new();
        let mut state = ConversationState::new(ThreadId::from("t1"), None);
        state.push(Message::user("Ahoy"));
        backend.save(&state).await.unwrap();

        let loaded = backend.load(&ThreadId::from("t1")).await.unwrap().unwrap();
        assert_eq!(loaded.messages(), state.messages());
        assert!(backend.load(&ThreadId::from("t2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_previous() {
        let backend = InMemoryCheckpoints::new();
        let mut state = ConversationState::new(ThreadId::from("t1"), None);
        backend.save(&state).await.unwrap();
        state.push(Message::user("second"));
        backend.save(&state).await.unwrap();

        let loaded = backend.load(&ThreadId::from("t1")).await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(backend.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let backend = InMemoryCheckpoints::new();
        backend
            .save(&ConversationState::new(ThreadId::from("t1"), None))
            .await
            .unwrap();
        assert!(backend.delete(&ThreadId::from("t1")).await.unwrap());
        assert!(!backend.delete(&ThreadId::from("t1")).await.unwrap());
    }
}
