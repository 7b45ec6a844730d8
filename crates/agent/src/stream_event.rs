//! Snapshots emitted while a turn runs.
//!
//! A turn yields one `TurnSnapshot` per state transition. Each carries a copy
//! of the transcript as it stood when the transition completed, so a caller
//! can render progress or persist intermediate state without touching the
//! live conversation.

use parley_core::message::{Message, ThreadId};
use serde::{Deserialize, Serialize};

/// Where the turn-taking state machine stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// A request to the model is about to go out.
    AwaitingModel,
    /// The model asked for tools; the batch is about to run.
    ExecutingTools,
    /// The model produced its final message.
    Done,
    /// The caller cancelled the turn.
    Cancelled,
}

impl TurnPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingModel => "awaiting_model",
            Self::ExecutingTools => "executing_tools",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnSnapshot {
    pub thread_id: ThreadId,
    pub turn: u64,
    pub phase: TurnPhase,
    /// Tool rounds completed so far in this turn.
    pub round: u32,
    pub messages: Vec<Message>,
}

impl TurnSnapshot {
    /// The final assistant text, once the turn is done.
    pub fn reply(&self) -> Option<&str> {
        if self.phase != TurnPhase::Done {
            return None;
        }
        self.messages.last().map(Message::content)
    }

    /// The newest message in the snapshot.
    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }
}
