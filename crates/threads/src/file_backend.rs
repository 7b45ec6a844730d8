//! File-based checkpoints — one JSON document per thread.
//!
//! Storage location: `~/.parley/threads/<thread-id>.json`
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-write never leaves a half-written checkpoint behind.

use async_trait::async_trait;
use parley_core::checkpoint::CheckpointBackend;
use parley_core::error::ThreadError;
use parley_core::message::{ConversationState, ThreadId};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSION: &str = "json";

pub struct FileCheckpoints {
    dir: PathBuf,
}

impl FileCheckpoints {
    /// Checkpoints under `dir`; the directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(dir = %dir.display(), "File checkpoint backend ready");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread_id: &ThreadId) -> PathBuf {
        self.dir
            .join(format!("{}.{EXTENSION}", encode_file_stem(thread_id.as_str())))
    }
}

/// Thread ids are caller-supplied: keep `[A-Za-z0-9_-]`, percent-encode the rest.
fn encode_file_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn decode_file_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn storage(context: &str, err: impl std::fmt::Display) -> ThreadError {
    ThreadError::Storage(format!("{context}: {err}"))
}

#[async_trait]
impl CheckpointBackend for FileCheckpoints {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>, ThreadError> {
        let path = self.path_for(thread_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage("Failed to read checkpoint", e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ThreadError::Corrupted {
                thread_id: thread_id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn save(&self, state: &ConversationState) -> Result<(), ThreadError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage("Failed to create threads directory", e))?;

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| storage("Failed to serialize checkpoint", e))?;

        let path = self.path_for(&state.thread_id);
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| storage("Failed to write checkpoint", e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| storage("Failed to move checkpoint into place", e))?;

        debug!(thread_id = %state.thread_id, messages = state.len(), "Checkpoint saved");
        Ok(())
    }

    async fn delete(&self, thread_id: &ThreadId) -> Result<bool, ThreadError> {
        match tokio::fs::remove_file(self.path_for(thread_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage("Failed to delete checkpoint", e)),
        }
    }

    async fn list(&self) -> Result<Vec<ThreadId>, ThreadError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage("Failed to read threads directory", e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage("Failed to read threads directory", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decode_file_stem(stem) {
                Some(id) => ids.push(ThreadId::from(id)),
                None => warn!(file = %path.display(), "Skipping checkpoint with undecodable name"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::Message;

    #[test]
    fn file_stems_round_trip() {
        for id in ["plain-id_1", "user@example.com", "a/b\\c", "ünïcode"] {
            let stem = encode_file_stem(id);
            assert!(stem.chars().all(|c| c.is_ascii_alphanumeric() || "-_%".contains(c)));
            assert_eq!(decode_file_stem(&stem).as_deref(), Some(id));
        }
    }

    #[tokio::test]
    async fn save_and_reload_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = ConversationState::new(ThreadId::from("user@example.com"), Some("Arr"));
        state.begin_turn("Multiply 2 by 2?");

        FileCheckpoints::new(dir.path()).save(&state).await.unwrap();

        // A fresh backend over the same directory sees it
        let backend = FileCheckpoints::new(dir.path());
        let loaded = backend.load(&state.thread_id).await.unwrap().unwrap();
        assert_eq!(loaded.messages(), state.messages());
        assert_eq!(loaded.turn, 1);
        assert_eq!(backend.list().await.unwrap(), vec![state.thread_id.clone()]);
    }

    #[tokio::test]
    async fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileCheckpoints::new(dir.path().join("not-yet"));
        assert!(backend.list().await.unwrap().is_empty());
        assert!(backend.load(&ThreadId::from("t")).await.unwrap().is_none());
        assert!(!backend.delete(&ThreadId::from("t")).await.unwrap());
    }

    #[tokio::test]
    async fn corrupted_checkpoint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "this is not json").unwrap();

        let backend = FileCheckpoints::new(dir.path());
        let err = backend.load(&ThreadId::from("broken")).await.unwrap_err();
        assert!(matches!(err, ThreadError::Corrupted { thread_id, .. } if thread_id == "broken"));
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileCheckpoints::new(dir.path());
        let mut state = ConversationState::new(ThreadId::from("t1"), None);
        state.push(Message::user("hi"));
        backend.save(&state).await.unwrap();

        assert!(backend.delete(&state.thread_id).await.unwrap());
        assert!(backend.load(&state.thread_id).await.unwrap().is_none());
    }
}
