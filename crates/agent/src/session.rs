//! The caller-facing session API.
//!
//! Wires a [`ThreadStore`] to an [`AgentLoop`]: every submitted turn takes
//! the thread's lock, loads (or creates) its state, runs the loop, and
//! commits every completed transition before it reaches the caller.

use crate::error::TurnError;
use crate::gateway::ModelGateway;
use crate::invoker::ToolInvoker;
use crate::loop_runner::{AgentConfig, AgentLoop, TurnStream};
use crate::stream_event::TurnSnapshot;
use futures::StreamExt;
use parley_config::AppConfig;
use parley_core::calendar::CalendarBackend;
use parley_core::checkpoint::CheckpointBackend;
use parley_core::error::{Error, ProviderError, ThreadError};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::{ConversationState, ThreadId};
use parley_core::persona::Persona;
use parley_core::provider::Provider;
use parley_threads::ThreadStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Agent {
    agent_loop: Arc<AgentLoop>,
    threads: Arc<ThreadStore>,
}

impl Agent {
    pub fn new(agent_loop: AgentLoop, threads: ThreadStore) -> Self {
        Self {
            agent_loop: Arc::new(agent_loop),
            threads: Arc::new(threads),
        }
    }

    /// Build everything from configuration: provider, calendar, tools, threads.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let router = parley_providers::build_from_config(config);
        let provider = router.default_provider().ok_or_else(|| {
            ProviderError::NotConfigured(format!("provider '{}' is not available", config.default_provider))
        })?;
        let calendar = parley_calendar::build_from_config(&config.calendar)?;
        let checkpoints = parley_threads::build_from_config(&config.threads);
        Self::from_parts(config, provider, calendar, checkpoints)
    }

    /// Build from configuration with the backends supplied by the caller.
    pub fn from_parts(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        calendar: Arc<dyn CalendarBackend>,
        checkpoints: Arc<dyn CheckpointBackend>,
    ) -> Result<Self, Error> {
        let settings = &config.agent;
        let model = config
            .providers
            .get(&config.default_provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| config.default_model.clone());

        let registry = parley_tools::default_registry(calendar, &config.calendar.time_zone)?;
        let event_bus = Arc::new(EventBus::default());

        let gateway = ModelGateway::new(provider, model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_timeout(Duration::from_secs(settings.model_timeout_secs));
        let invoker = ToolInvoker::new(Arc::new(registry), event_bus.clone())
            .with_timeout(Duration::from_secs(settings.tool_timeout_secs));
        let agent_loop =
            AgentLoop::new(gateway, invoker, event_bus).with_config(AgentConfig::from(settings));

        let persona = Persona::from_override(config.persona.system_prompt.as_deref());
        let threads = ThreadStore::new(checkpoints).with_system_prompt(persona.system_prompt);

        info!(
            provider = agent_loop.gateway().provider_name(),
            model = agent_loop.gateway().model(),
            threads = threads.backend_name(),
            "Agent ready"
        );
        Ok(Self::new(agent_loop, threads))
    }

    /// Run one turn on `thread_id`.
    pub fn submit_turn(
        &self,
        thread_id: impl Into<ThreadId>,
        utterance: impl Into<String>,
    ) -> TurnStream<'static> {
        self.submit_turn_with_cancel(thread_id, utterance, CancellationToken::new())
    }

    /// Run one turn on `thread_id`, stopping early once `cancel` fires.
    ///
    /// The stream holds the thread's lock for as long as it lives; a second
    /// turn on the same thread waits until this one is finished or dropped.
    /// State is committed before each snapshot is yielded and before the
    /// terminal item, including when the turn was cancelled or failed, so a
    /// caller that drops the stream early leaves the last transition stored.
    pub fn submit_turn_with_cancel(
        &self,
        thread_id: impl Into<ThreadId>,
        utterance: impl Into<String>,
        cancel: CancellationToken,
    ) -> TurnStream<'static> {
        let thread_id = thread_id.into();
        let utterance = utterance.into();
        let agent_loop = self.agent_loop.clone();
        let threads = self.threads.clone();

        Box::pin(async_stream::stream! {
            let _guard = threads.lock(&thread_id).await;
            debug!(thread_id = %thread_id, "Acquired thread lock");

            let mut state = match threads.get_or_create(&thread_id).await {
                Ok(state) => state,
                Err(e) => {
                    yield Err(TurnError::from(e));
                    return;
                }
            };

            // `state` is borrowed by the loop; mirror its snapshots here
            let mut checkpoint = state.clone();
            let mut terminal = None;
            {
                let mut inner = agent_loop.run_turn(&mut state, utterance, cancel);
                while let Some(item) = inner.next().await {
                    let is_terminal = match &item {
                        Ok(snapshot) => snapshot.phase.is_terminal(),
                        Err(_) => true,
                    };
                    if is_terminal {
                        terminal = Some(item);
                        break;
                    }
                    if let Ok(snapshot) = &item {
                        advance(&mut checkpoint, snapshot);
                    }
                    if let Err(e) = threads.commit(&checkpoint).await {
                        yield Err(TurnError::from(e));
                        return;
                    }
                    yield item;
                }
            }

            let committed = threads.commit(&state).await;
            match (terminal, committed) {
                (Some(item), Ok(())) => yield item,
                (Some(Ok(_)), Err(e)) => yield Err(TurnError::from(e)),
                (Some(Err(turn_error)), Err(e)) => {
                    warn!(thread_id = %thread_id, error = %e, "Commit after failed turn also failed");
                    yield Err(turn_error);
                }
                (None, Ok(())) => {}
                (None, Err(e)) => yield Err(TurnError::from(e)),
            }
        })
    }

    /// Run a turn to completion and return its terminal snapshot.
    pub async fn respond(
        &self,
        thread_id: impl Into<ThreadId>,
        utterance: impl Into<String>,
    ) -> Result<TurnSnapshot, TurnError> {
        let mut stream = self.submit_turn(thread_id, utterance);
        let mut last = None;
        while let Some(item) = stream.next().await {
            last = Some(item?);
        }
        last.ok_or_else(|| TurnError::Thread(ThreadError::Storage("turn produced no output".into())))
    }

    /// The persisted state of a thread, if it exists.
    pub async fn transcript(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>, ThreadError> {
        self.threads.get(thread_id).await
    }

    /// Forget a thread. Waits for any turn in progress on it.
    pub async fn reset(&self, thread_id: &ThreadId) -> Result<bool, ThreadError> {
        let guard = self.threads.lock(thread_id).await;
        let removed = self.threads.evict(thread_id).await;
        drop(guard);
        self.threads.release_lock(thread_id);
        removed
    }

    pub async fn threads(&self) -> Result<Vec<ThreadId>, ThreadError> {
        self.threads.list().await
    }

    /// Receive domain events from every turn this agent runs.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.agent_loop.event_bus().subscribe()
    }

    pub fn model(&self) -> &str {
        self.agent_loop.gateway().model()
    }
}

/// Append whatever `snapshot` holds beyond `checkpoint`.
fn advance(checkpoint: &mut ConversationState, snapshot: &TurnSnapshot) {
    checkpoint.turn = snapshot.turn;
    for message in snapshot.messages.iter().skip(checkpoint.len()) {
        checkpoint.push(message.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_event::TurnPhase;
    use crate::test_helpers::{ScriptedProvider, Step, text_response, tool_call, tool_call_response};
    use parley_calendar::InMemoryCalendar;
    use parley_core::message::Message;
    use parley_threads::InMemoryCheckpoints;
    use serde_json::json;

    fn agent(provider: Arc<ScriptedProvider>) -> Agent {
        agent_with_calendar(provider, Arc::new(InMemoryCalendar::new()))
    }

    fn agent_with_calendar(provider: Arc<ScriptedProvider>, calendar: Arc<InMemoryCalendar>) -> Agent {
        let mut config = AppConfig::default();
        config.persona.system_prompt = Some("You are a pirate.".into());
        config.agent.retry.max_retries = 0;
        Agent::from_parts(&config, provider, calendar, Arc::new(InMemoryCheckpoints::new())).unwrap()
    }

    #[tokio::test]
    async fn turn_is_committed() {
        let agent = agent(Arc::new(ScriptedProvider::new(vec![Step::Respond(text_response(
            "Ahoy!",
        ))])));
        let id = ThreadId::from("t1");

        let done = agent.respond(id.clone(), "Hello").await.unwrap();
        assert_eq!(done.reply(), Some("Ahoy!"));

        let stored = agent.transcript(&id).await.unwrap().unwrap();
        assert_eq!(stored.turn, 1);
        assert_eq!(
            stored.messages(),
            &[
                Message::system("You are a pirate."),
                Message::user("Hello"),
                Message::assistant("Ahoy!")
            ]
        );
    }

    #[tokio::test]
    async fn persona_is_prepended_once() {
        let agent = agent(Arc::new(ScriptedProvider::always(Step::Respond(text_response(
            "Arr",
        )))));
        let id = ThreadId::from("t1");

        agent.respond(id.clone(), "one").await.unwrap();
        agent.respond(id.clone(), "two").await.unwrap();

        let stored = agent.transcript(&id).await.unwrap().unwrap();
        assert_eq!(stored.turn, 2);
        assert_eq!(stored.messages().iter().filter(|m| m.is_system()).count(), 1);
        assert_eq!(stored.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn same_thread_turns_are_serialized() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Delay(Duration::from_millis(50), text_response("first answer")),
            Step::Respond(text_response("second answer")),
        ]));
        let agent = Arc::new(agent(provider.clone()));
        let id = ThreadId::from("shared");

        let first = {
            let agent = agent.clone();
            let id = id.clone();
            tokio::spawn(async move { agent.respond(id, "first").await })
        };
        tokio::task::yield_now().await;
        let second = {
            let agent = agent.clone();
            let id = id.clone();
            tokio::spawn(async move { agent.respond(id, "second").await })
        };

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        // The second request saw the whole first turn
        let requests = provider.requests();
        assert_eq!(requests[1].messages.len(), 4);
        let stored = agent.transcript(&id).await.unwrap().unwrap();
        let contents: Vec<_> = stored.messages().iter().map(Message::content).collect();
        assert_eq!(
            contents,
            vec!["You are a pirate.", "first", "first answer", "second", "second answer"]
        );
    }

    #[tokio::test]
    async fn threads_do_not_share_state() {
        let agent = agent(Arc::new(ScriptedProvider::always(Step::Respond(text_response(
            "Arr",
        )))));
        agent.respond("a", "for a").await.unwrap();
        agent.respond("b", "for b").await.unwrap();

        let a = agent.transcript(&ThreadId::from("a")).await.unwrap().unwrap();
        let b = agent.transcript(&ThreadId::from("b")).await.unwrap().unwrap();
        assert_eq!(a.messages()[1].content(), "for a");
        assert_eq!(b.messages()[1].content(), "for b");
        assert_eq!(a.len(), 3);

        let mut ids = agent.threads().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec![ThreadId::from("a"), ThreadId::from("b")]);
    }

    #[tokio::test]
    async fn cancelled_turn_is_committed() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = agent(provider.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let items: Vec<_> = agent
            .submit_turn_with_cancel("t1", "never answered", cancel)
            .collect()
            .await;
        let last = items.last().unwrap().as_ref().unwrap();
        assert_eq!(last.phase, TurnPhase::Cancelled);
        assert_eq!(provider.call_count(), 0);

        let stored = agent.transcript(&ThreadId::from("t1")).await.unwrap().unwrap();
        assert_eq!(stored.last(), Some(&Message::user("never answered")));
    }

    #[tokio::test]
    async fn failed_turn_keeps_partial_transcript() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Respond(tool_call_response(
                vec![tool_call("call_1", "multiply", json!({"a": 2, "b": 2}))],
                "",
            )),
            Step::Fail(ProviderError::AuthenticationFailed("revoked".into())),
        ]));
        let agent = agent(provider);

        let err = agent.respond("t1", "Multiply 2 by 2?").await.unwrap_err();
        assert!(matches!(err, TurnError::ModelUnavailable { attempts: 1, .. }));

        let stored = agent.transcript(&ThreadId::from("t1")).await.unwrap().unwrap();
        assert!(matches!(stored.last(), Some(Message::ToolResult { content, .. }) if content == "4"));
    }

    #[tokio::test]
    async fn reset_forgets_the_thread() {
        let agent = agent(Arc::new(ScriptedProvider::always(Step::Respond(text_response(
            "Arr",
        )))));
        let id = ThreadId::from("t1");
        agent.respond(id.clone(), "Hello").await.unwrap();

        assert!(agent.reset(&id).await.unwrap());
        assert!(agent.transcript(&id).await.unwrap().is_none());
        assert!(!agent.reset(&id).await.unwrap());

        // A fresh thread starts over with only the persona
        agent.respond(id.clone(), "Again").await.unwrap();
        let stored = agent.transcript(&id).await.unwrap().unwrap();
        assert_eq!(stored.turn, 1);
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn reset_releases_the_thread_lock() {
        let agent = agent(Arc::new(ScriptedProvider::always(Step::Respond(text_response(
            "Arr",
        )))));
        let id = ThreadId::from("t1");
        agent.respond(id.clone(), "Hello").await.unwrap();

        agent.reset(&id).await.unwrap();
        assert_eq!(agent.threads.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn dropped_stream_keeps_completed_tool_round() {
        let calendar = Arc::new(InMemoryCalendar::new());
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Respond(tool_call_response(
                vec![tool_call(
                    "call_1",
                    "add_calendar_event",
                    json!({
                        "summary": "Dentist",
                        "description": "Checkup",
                        "user_query": "Book the dentist tomorrow at 3pm"
                    }),
                )],
                "",
            )),
            Step::Respond(text_response("Booked, matey")),
        ]));
        let agent = agent_with_calendar(provider, calendar.clone());
        let id = ThreadId::from("t1");

        {
            let mut stream = agent.submit_turn(id.clone(), "Book the dentist tomorrow at 3pm");
            while let Some(item) = stream.next().await {
                let snapshot = item.unwrap();
                if snapshot.phase == TurnPhase::AwaitingModel && snapshot.round == 1 {
                    break;
                }
            }
        }

        assert_eq!(calendar.inserted().await.len(), 1);
        let stored = agent.transcript(&id).await.unwrap().unwrap();
        assert_eq!(stored.turn, 1);
        assert_eq!(stored.len(), 4);
        assert_eq!(stored.messages()[1], Message::user("Book the dentist tomorrow at 3pm"));
        assert!(matches!(
            &stored.messages()[2],
            Message::Assistant { tool_calls, .. } if tool_calls.len() == 1
        ));
        assert!(matches!(
            &stored.messages()[3],
            Message::ToolResult { tool_call_id, .. } if tool_call_id == "call_1"
        ));
    }

    #[tokio::test]
    async fn intermediate_snapshots_are_streamed() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Respond(tool_call_response(
                vec![tool_call("call_1", "multiply", json!({"a": 6, "b": 7}))],
                "",
            )),
            Step::Respond(text_response("42, says the parrot")),
        ]));
        let agent = agent(provider);

        let phases: Vec<_> = agent
            .submit_turn("t1", "6 times 7")
            .map(|item| item.unwrap().phase)
            .collect()
            .await;
        assert_eq!(
            phases,
            vec![
                TurnPhase::AwaitingModel,
                TurnPhase::ExecutingTools,
                TurnPhase::AwaitingModel,
                TurnPhase::Done
            ]
        );
    }
}
