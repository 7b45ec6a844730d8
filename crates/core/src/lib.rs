//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley scheduling agent.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Layout
//!
//! Every external collaborator is a trait here, with implementations in
//! their own crates:
//! - [`Provider`] — the language-model backend (`parley-providers`)
//! - [`CalendarBackend`] — the calendar service (`parley-calendar`)
//! - [`CheckpointBackend`] — thread persistence (`parley-threads`)
//! - [`Tool`] — callable capabilities (`parley-tools`)

pub mod calendar;
pub mod checkpoint;
pub mod error;
pub mod event;
pub mod message;
pub mod persona;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use calendar::{CalendarBackend, CalendarEvent, CreatedEvent, NewEvent};
pub use checkpoint::CheckpointBackend;
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationState, Message, ThreadId, ToolCall};
pub use persona::Persona;
pub use provider::{ModelResponse, Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{ParamKind, ParamSpec, ParameterSchema, Tool, ToolFailure, ToolRegistry, ToolResult};
