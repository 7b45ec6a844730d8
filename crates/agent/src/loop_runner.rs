//! The turn-taking state machine.
//!
//! One call to [`AgentLoop::run_turn`] drives one user turn:
//!
//! 1. **Append** the user's utterance and bump the turn counter
//! 2. **AwaitingModel**: send the transcript (and, when offered, the tool schema)
//! 3. **If tool calls**: append the batch, run every call, append the results
//!    in call order, then go back to step 2
//! 4. **If text**: append it as the final assistant message and stop
//!
//! Each transition yields a [`TurnSnapshot`]. The stream ends with a `Done`
//! or `Cancelled` snapshot, or with a [`TurnError`].

use crate::error::TurnError;
use crate::gateway::ModelGateway;
use crate::invoker::ToolInvoker;
use crate::stream_event::{TurnPhase, TurnSnapshot};
use chrono::Utc;
use futures::Stream;
use futures::future::join_all;
use parley_config::{AgentSettings, RetrySettings};
use parley_core::error::ProviderError;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::{ConversationState, Message, ThreadId, ToolCall};
use parley_core::provider::{ModelResponse, ToolDefinition};
use parley_core::tool::{ToolFailure, ToolResult};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The lazy, finite sequence of snapshots a turn produces.
pub type TurnStream<'a> = Pin<Box<dyn Stream<Item = Result<TurnSnapshot, TurnError>> + Send + 'a>>;

const MAX_BACKOFF_SECS: f64 = 300.0;

/// How often a transient failure is retried, and how long to wait between tries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Fail on the first error.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total tries, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .max(1.0)
            .powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64((self.initial_backoff.as_secs_f64() * factor).min(MAX_BACKOFF_SECS))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            backoff_multiplier: settings.backoff_multiplier,
        }
    }
}

/// Per-turn behaviour of the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Tool rounds allowed in one turn.
    pub max_tool_rounds: u32,
    /// Offer tools on every model call instead of only the first.
    pub multi_round: bool,
    /// Run the calls of one batch concurrently.
    pub parallel_tools: bool,
    pub retry: RetryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from(&AgentSettings::default())
    }
}

impl From<&AgentSettings> for AgentConfig {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            max_tool_rounds: settings.max_tool_rounds,
            multi_round: settings.multi_round,
            parallel_tools: settings.parallel_tools,
            retry: RetryPolicy::from(&settings.retry),
        }
    }
}

pub struct AgentLoop {
    gateway: ModelGateway,
    invoker: ToolInvoker,
    config: AgentConfig,
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    pub fn new(gateway: ModelGateway, invoker: ToolInvoker, event_bus: Arc<EventBus>) -> Self {
        Self {
            gateway,
            invoker,
            config: AgentConfig::default(),
            event_bus,
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Run one turn against `state`.
    ///
    /// Nothing happens until the stream is polled. Every append to `state`
    /// completes before the snapshot describing it is yielded, so dropping
    /// the stream at any point leaves a consistent transcript.
    pub fn run_turn<'a>(
        &'a self,
        state: &'a mut ConversationState,
        utterance: impl Into<String>,
        cancel: CancellationToken,
    ) -> TurnStream<'a> {
        let utterance = utterance.into();

        Box::pin(async_stream::stream! {
            let turn = state.begin_turn(utterance);
            let thread_id = state.thread_id.clone();
            let mut round: u32 = 0;

            info!(thread_id = %thread_id, turn, "Turn started");
            self.event_bus.publish(DomainEvent::TurnStarted {
                thread_id: thread_id.to_string(),
                turn,
                timestamp: Utc::now(),
            });

            loop {
                yield Ok(snapshot(state, turn, TurnPhase::AwaitingModel, round));

                if cancel.is_cancelled() {
                    info!(thread_id = %thread_id, turn, round, "Turn cancelled");
                    self.finish(&thread_id, turn, "cancelled");
                    yield Ok(snapshot(state, turn, TurnPhase::Cancelled, round));
                    return;
                }

                let offer_tools = self.config.multi_round || round == 0;
                let tools = if offer_tools {
                    self.invoker.registry().definitions()
                } else {
                    vec![]
                };

                let response = match self.complete_with_retry(&thread_id, state.messages(), &tools).await {
                    Ok(response) => response,
                    Err(e) => {
                        self.fail(&thread_id, turn, &e);
                        yield Err(e);
                        return;
                    }
                };

                match response {
                    ModelResponse::FinalMessage { content } => {
                        state.push(Message::assistant(content));
                        info!(thread_id = %thread_id, turn, rounds = round, "Turn done");
                        self.finish(&thread_id, turn, "done");
                        yield Ok(snapshot(state, turn, TurnPhase::Done, round));
                        return;
                    }
                    ModelResponse::ToolCallBatch { content, calls } if !offer_tools => {
                        warn!(
                            thread_id = %thread_id,
                            turn,
                            dropped = calls.len(),
                            "Model requested tools on a follow-up call; keeping only its text"
                        );
                        state.push(Message::assistant(content));
                        self.finish(&thread_id, turn, "done");
                        yield Ok(snapshot(state, turn, TurnPhase::Done, round));
                        return;
                    }
                    ModelResponse::ToolCallBatch { content, calls } => {
                        if round >= self.config.max_tool_rounds {
                            let e = TurnError::TurnBudgetExceeded {
                                max_rounds: self.config.max_tool_rounds,
                            };
                            self.fail(&thread_id, turn, &e);
                            yield Err(e);
                            return;
                        }

                        round += 1;
                        debug!(thread_id = %thread_id, turn, round, calls = calls.len(), "Executing tool batch");
                        state.push(Message::assistant_with_tools(content, calls.clone()));
                        yield Ok(snapshot(state, turn, TurnPhase::ExecutingTools, round));

                        let outcomes = self.execute_batch(&calls).await;
                        let mut timed_out = None;
                        for (result, attempts) in outcomes {
                            if timed_out.is_none() && result.failure == Some(ToolFailure::Timeout) {
                                timed_out = Some(TurnError::ToolTimeout {
                                    tool: result.name.clone(),
                                    attempts,
                                });
                            }
                            state.push(result.into_message());
                        }

                        if let Some(e) = timed_out {
                            self.fail(&thread_id, turn, &e);
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        })
    }

    async fn complete_with_retry(
        &self,
        thread_id: &ThreadId,
        transcript: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, TurnError> {
        let policy = &self.config.retry;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.gateway.complete(transcript, tools).await {
                Ok(response) => {
                    let tool_calls = match &response {
                        ModelResponse::ToolCallBatch { calls, .. } => calls.len(),
                        ModelResponse::FinalMessage { .. } => 0,
                    };
                    self.event_bus.publish(DomainEvent::ResponseGenerated {
                        thread_id: thread_id.to_string(),
                        model: self.gateway.model().to_string(),
                        tool_calls,
                        timestamp: Utc::now(),
                    });
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < policy.max_attempts() => {
                    let mut delay = policy.backoff(attempt);
                    if let ProviderError::RateLimited { retry_after_secs } = &e {
                        delay = delay.max(Duration::from_secs(*retry_after_secs));
                    }
                    warn!(
                        thread_id = %thread_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(TurnError::ModelUnavailable {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// Run a batch; results come back in call order with their attempt counts.
    async fn execute_batch(&self, calls: &[ToolCall]) -> Vec<(ToolResult, u32)> {
        if self.config.parallel_tools {
            join_all(calls.iter().map(|call| self.invoke_with_retry(call))).await
        } else {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in calls {
                outcomes.push(self.invoke_with_retry(call).await);
            }
            outcomes
        }
    }

    async fn invoke_with_retry(&self, call: &ToolCall) -> (ToolResult, u32) {
        let policy = &self.config.retry;
        let mut attempt = 1;
        loop {
            let result = self.invoker.invoke(call).await;
            if result.failure != Some(ToolFailure::Timeout) || attempt >= policy.max_attempts() {
                return (result, attempt);
            }
            let delay = policy.backoff(attempt);
            warn!(tool = %call.name, call_id = %call.id, attempt, "Tool timed out, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn finish(&self, thread_id: &ThreadId, turn: u64, outcome: &str) {
        self.event_bus.publish(DomainEvent::TurnFinished {
            thread_id: thread_id.to_string(),
            turn,
            outcome: outcome.into(),
            timestamp: Utc::now(),
        });
    }

    fn fail(&self, thread_id: &ThreadId, turn: u64, error: &TurnError) {
        warn!(thread_id = %thread_id, turn, error = %error, "Turn failed");
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: format!("turn {turn} of thread {thread_id}"),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
        self.finish(thread_id, turn, error.kind());
    }
}

fn snapshot(state: &ConversationState, turn: u64, phase: TurnPhase, round: u32) -> TurnSnapshot {
    TurnSnapshot {
        thread_id: state.thread_id.clone(),
        turn,
        phase,
        round,
        messages: state.messages().to_vec(),
    }
}
