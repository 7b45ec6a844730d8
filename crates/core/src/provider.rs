//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation to an LLM and get a response
//! back. The agent only ever sees the response as a [`ModelResponse`]:
//! either a final answer or a batch of tool calls.

use crate::error::ProviderError;
use crate::message::{Message, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Provider-specific metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ProviderResponse {
    /// Classify the generated message.
    pub fn into_model_response(self) -> ModelResponse {
        match self.message {
            Message::Assistant {
                content,
                tool_calls,
            } if !tool_calls.is_empty() => ModelResponse::ToolCallBatch {
                content,
                calls: tool_calls,
            },
            other => ModelResponse::FinalMessage {
                content: other.content().to_string(),
            },
        }
    }
}

/// What the model decided to do with a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelResponse {
    /// Text meant for the user; ends the turn.
    FinalMessage { content: String },

    /// One or more tool calls, possibly with some accompanying text.
    ToolCallBatch { content: String, calls: Vec<ToolCall> },
}

impl ModelResponse {
    /// The assistant message this response appends to the transcript.
    pub fn to_message(&self) -> Message {
        match self {
            Self::FinalMessage { content } => Message::assistant(content.clone()),
            Self::ToolCallBatch { content, calls } => {
                Message::assistant_with_tools(content.clone(), calls.clone())
            }
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// Every LLM backend implements this trait. The agent loop calls `complete()`
/// without knowing which provider is being used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// List available models for this provider.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(message: Message) -> ProviderResponse {
        ProviderResponse {
            message,
            usage: None,
            model: "gpt-4o-mini".into(),
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn provider_request_default_temperature() {
        let req: ProviderRequest =
            serde_json::from_str(r#"{"model":"gpt-4o-mini","messages":[]}"#).unwrap();
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.tools.is_empty());
    }

    #[test]
    fn assistant_with_calls_is_a_batch() {
        let calls = vec![ToolCall::new("c1", "multiply", serde_json::json!({"a": 2, "b": 2}))];
        let classified = response(Message::assistant_with_tools("", calls.clone())).into_model_response();
        assert_eq!(
            classified,
            ModelResponse::ToolCallBatch {
                content: String::new(),
                calls
            }
        );
    }

    #[test]
    fn plain_assistant_is_final() {
        let classified = response(Message::assistant("Arr, 'tis 4!")).into_model_response();
        assert_eq!(
            classified,
            ModelResponse::FinalMessage {
                content: "Arr, 'tis 4!".into()
            }
        );
        assert_eq!(classified.to_message(), Message::assistant("Arr, 'tis 4!"));
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "multiply".into(),
            description: "Multiply two integers".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "a": { "type": "integer" },
                    "b": { "type": "integer" }
                },
                "required": ["a", "b"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("multiply"));
        assert!(json.contains("required"));
    }
}
