//! Turn-level failures.
//!
//! Everything that goes wrong inside a single tool call is contained by the
//! invoker and shown to the model. A `TurnError` is what remains: the turn
//! cannot make progress, and it ends in the errored state with whatever was
//! appended so far still in the transcript.

use parley_core::error::{ProviderError, ThreadError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TurnError {
    /// The model backend kept failing (or failed with a non-transient error).
    #[error("Model unavailable after {attempts} attempt(s): {source}")]
    ModelUnavailable {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// A tool kept timing out after every retry.
    #[error("Tool '{tool}' timed out after {attempts} attempt(s)")]
    ToolTimeout { tool: String, attempts: u32 },

    /// The model asked for more tool rounds than a turn allows.
    #[error("Turn exceeded its budget of {max_rounds} tool round(s)")]
    TurnBudgetExceeded { max_rounds: u32 },

    /// Loading or committing the thread failed.
    #[error(transparent)]
    Thread(#[from] ThreadError),
}

impl TurnError {
    /// Short label used for the `TurnFinished` event and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::ToolTimeout { .. } => "tool_timeout",
            Self::TurnBudgetExceeded { .. } => "budget_exceeded",
            Self::Thread(_) => "thread_store",
        }
    }
}
