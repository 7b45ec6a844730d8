//! ToolInvoker: runs one requested tool call and normalizes the outcome.
//!
//! `invoke` never fails. Unknown tools, bad arguments, tool errors, panics
//! and timeouts all come back as a failure [`ToolResult`] the model can read.

use chrono::Utc;
use futures::FutureExt;
use parley_core::error::ToolError;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::ToolCall;
use parley_core::tool::{ToolRegistry, ToolResult};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(30),
            event_bus,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute `call` and return its result, success or failure.
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let started = Instant::now();
        let outcome = self.run(call).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(value) => {
                debug!(tool = %call.name, call_id = %call.id, duration_ms, "Tool succeeded");
                ToolResult::success(&call.id, &call.name, value)
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, duration_ms, error = %e, "Tool failed");
                ToolResult::failure(&call.id, &call.name, &e)
            }
        };

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: result.is_success(),
            duration_ms,
            timestamp: Utc::now(),
        });

        result
    }

    async fn run(&self, call: &ToolCall) -> Result<serde_json::Value, ToolError> {
        let tool = self.registry.resolve(&call.name)?;
        let arguments = tool.parameters().validate(tool.name(), &call.arguments)?;

        let execution = AssertUnwindSafe(tool.execute(arguments)).catch_unwind();
        match tokio::time::timeout(self.timeout, execution).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(ToolError::execution(
                &call.name,
                format!("tool panicked: {}", panic_message(payload.as_ref())),
            )),
            Err(_) => Err(ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
