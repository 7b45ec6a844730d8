//! Shared test doubles for the agent crate.

use async_trait::async_trait;
use parley_core::error::{ProviderError, ToolError};
use parley_core::message::{Message, ToolCall};
use parley_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use parley_core::tool::{ParamKind, ParamSpec, ParameterSchema, Tool};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One scripted provider reaction.
#[derive(Clone)]
pub enum Step {
    Respond(ProviderResponse),
    Fail(ProviderError),
    /// Sleep, then respond.
    Delay(Duration, ProviderResponse),
}

/// A provider that plays back a script, one step per `complete` call.
///
/// Panics when called more often than scripted, unless built with
/// [`ScriptedProvider::always`].
pub struct ScriptedProvider {
    steps: Mutex<Vec<Step>>,
    repeat: Option<Step>,
    requests: Mutex<Vec<ProviderRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps),
            repeat: None,
            requests: Mutex::new(vec![]),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer every call with the same step.
    pub fn always(step: Step) -> Self {
        Self {
            repeat: Some(step),
            ..Self::new(vec![])
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.is_empty() {
                match &self.repeat {
                    Some(step) => step.clone(),
                    None => panic!("ScriptedProvider: no step for call #{n}"),
                }
            } else {
                steps.remove(0)
            }
        };

        match step {
            Step::Respond(response) => Ok(response),
            Step::Fail(err) => Err(err),
            Step::Delay(delay, response) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
        }
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// A plain text answer.
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock-model".into(),
        metadata: serde_json::Map::new(),
    }
}

/// A tool-call batch with optional accompanying text.
pub fn tool_call_response(calls: Vec<ToolCall>, content: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools(content, calls),
        usage: usage(),
        model: "mock-model".into(),
        metadata: serde_json::Map::new(),
    }
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(id, name, arguments)
}

/// Always fails with an execution error.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "always_fails"
    }

    fn description(&self) -> &str {
        "Fails every time"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![])
    }

    async fn execute(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        Err(ToolError::execution(self.name(), "backend said no"))
    }
}

/// Panics every time.
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "panics"
    }

    fn description(&self) -> &str {
        "Panics every time"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![])
    }

    async fn execute(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        panic!("tool blew up");
    }
}

/// Sleeps for `millis`, then echoes `label`. Counts executions.
pub struct SleepyTool {
    pub calls: Arc<AtomicUsize>,
}

impl SleepyTool {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Tool for SleepyTool {
    fn name(&self) -> &str {
        "sleepy"
    }

    fn description(&self) -> &str {
        "Sleeps, then echoes its label"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            ParamSpec::required("label", ParamKind::String, "Echoed back"),
            ParamSpec::required("millis", ParamKind::Integer, "How long to sleep"),
        ])
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let millis = arguments.get("millis").and_then(Value::as_u64).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(arguments.get("label").cloned().unwrap_or(Value::Null))
    }
}
