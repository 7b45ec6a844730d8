//! The Parley agent, a turn-taking loop between a user, a model and tools.
//!
//! A turn follows an **Ask → Act → Answer** cycle:
//!
//! 1. **Receive** a user utterance for a thread
//! 2. **Ask** the model, offering the tool schema
//! 3. **If tool calls**: run them through the [`ToolInvoker`], append the
//!    results, and ask again
//! 4. **If text**: that is the answer; commit the thread
//!
//! [`Agent`] is the entry point for callers; [`AgentLoop`] is the state
//! machine underneath it.

pub mod error;
pub mod gateway;
pub mod invoker;
pub mod loop_runner;
pub mod session;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use error::TurnError;
pub use gateway::ModelGateway;
pub use invoker::ToolInvoker;
pub use loop_runner::{AgentConfig, AgentLoop, RetryPolicy, TurnStream};
pub use session::Agent;
pub use stream_event::{TurnPhase, TurnSnapshot};
