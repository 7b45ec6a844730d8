//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! multiply numbers, read the calendar, book an event.

use crate::error::{RegistryError, ToolError};
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// JSON type a parameter is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Number,
    String,
    Boolean,
}

impl ParamKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }

    /// Coerce a JSON value into this kind, if it reasonably represents one.
    fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(Value::from),
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (Self::Number, Value::Number(_)) => Some(value.clone()),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            (Self::String, Value::String(_)) => Some(value.clone()),
            (Self::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (Self::Boolean, Value::Bool(_)) => Some(value.clone()),
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: description.into(),
        }
    }
}

/// The typed parameter list of a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub params: Vec<ParamSpec>,
}

impl ParameterSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// JSON Schema sent to the model.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({
                        "type": p.kind.as_str(),
                        "description": p.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate and coerce a raw argument payload.
    ///
    /// Returns only declared parameters; `null` optional values are dropped.
    pub fn validate(&self, tool_name: &str, arguments: &Value) -> Result<Map<String, Value>, ToolError> {
        let empty = Map::new();
        let raw = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ToolError::invalid_arguments(
                    tool_name,
                    format!("expected a JSON object, got {}", json_type_name(other)),
                ));
            }
        };

        let mut validated = Map::new();
        for spec in &self.params {
            match raw.get(&spec.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    let coerced = spec.kind.coerce(value).ok_or_else(|| {
                        ToolError::invalid_arguments(
                            tool_name,
                            format!(
                                "'{}' must be {} {}, got {}",
                                spec.name,
                                article(spec.kind),
                                spec.kind.as_str(),
                                json_type_name(value)
                            ),
                        )
                    })?;
                    validated.insert(spec.name.clone(), coerced);
                }
                None if spec.required => {
                    return Err(ToolError::invalid_arguments(
                        tool_name,
                        format!("missing required argument '{}'", spec.name),
                    ));
                }
                None => {}
            }
        }
        Ok(validated)
    }
}

fn article(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Integer => "an",
        _ => "a",
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// What went wrong when a tool call did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailure {
    UnknownTool,
    InvalidArguments,
    Execution,
    Timeout,
}

impl From<&ToolError> for ToolFailure {
    fn from(err: &ToolError) -> Self {
        match err {
            ToolError::UnknownTool(_) => Self::UnknownTool,
            ToolError::InvalidArguments { .. } => Self::InvalidArguments,
            ToolError::ExecutionFailed { .. } => Self::Execution,
            ToolError::Timeout { .. } => Self::Timeout,
        }
    }
}

/// The normalized outcome of one tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// The tool that was (or would have been) called
    pub name: String,

    /// Text shown to the model
    pub output: String,

    /// Structured value on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Set when the call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ToolFailure>,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, name: impl Into<String>, data: Value) -> Self {
        let output = match &data {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            call_id: call_id.into(),
            name: name.into(),
            output,
            data: Some(data),
            failure: None,
        }
    }

    pub fn failure(call_id: impl Into<String>, name: impl Into<String>, error: &ToolError) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            output: format!("Error: {error}"),
            data: None,
            failure: Some(ToolFailure::from(error)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Convert into the transcript message answering the call.
    pub fn into_message(self) -> crate::message::Message {
        let is_error = self.failure.is_some();
        crate::message::Message::tool_result(self.call_id, self.name, self.output, is_error)
    }
}

/// The core Tool trait.
///
/// Each tool implements this trait and is registered in the [`ToolRegistry`].
/// Arguments reach `execute` already validated against `parameters()`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "multiply").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Declared parameters.
    fn parameters(&self) -> ParameterSchema;

    /// Execute the tool with validated arguments.
    async fn execute(&self, arguments: Map<String, Value>) -> Result<Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().to_json_schema(),
        }
    }
}

/// A registry of available tools.
///
/// Built once, then shared behind an `Arc`; the agent never mutates it.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look a tool up by name.
    pub fn resolve(&self, name: &str) -> Result<&dyn Tool, ToolError> {
        self.tools
            .get(name)
            .map(|t| t.as_ref())
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Tool definitions for the model, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
