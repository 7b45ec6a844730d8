//! Multiply tool — integer multiplication.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::tool::{ParamKind, ParamSpec, ParameterSchema, Tool};
use serde_json::{Map, Value};

pub struct MultiplyTool;

#[async_trait]
impl Tool for MultiplyTool {
    fn name(&self) -> &str {
        "multiply"
    }

    fn description(&self) -> &str {
        "Multiply two integers together."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            ParamSpec::required("a", ParamKind::Integer, "First integer"),
            ParamSpec::required("b", ParamKind::Integer, "Second integer"),
        ])
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let a = integer_arg(&arguments, "a")?;
        let b = integer_arg(&arguments, "b")?;

        a.checked_mul(b)
            .map(Value::from)
            .ok_or_else(|| ToolError::execution(self.name(), format!("{a} * {b} overflows a 64-bit integer")))
    }
}

fn integer_arg(arguments: &Map<String, Value>, name: &str) -> Result<i64, ToolError> {
    arguments
        .get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| ToolError::invalid_arguments("multiply", format!("'{name}' must be an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn run(args: Value) -> Result<Value, ToolError> {
        let tool = MultiplyTool;
        let validated = tool.parameters().validate(tool.name(), &args)?;
        tool.execute(validated).await
    }

    #[tokio::test]
    async fn multiplies() {
        assert_eq!(run(json!({"a": 2, "b": 2})).await.unwrap(), json!(4));
        assert_eq!(run(json!({"a": -7, "b": 6})).await.unwrap(), json!(-42));
        assert_eq!(run(json!({"a": 0, "b": i64::MAX})).await.unwrap(), json!(0));
    }

    #[tokio::test]
    async fn accepts_coerced_strings() {
        assert_eq!(run(json!({"a": "3", "b": 4.0})).await.unwrap(), json!(12));
    }

    #[tokio::test]
    async fn overflow_is_an_execution_failure() {
        let err = run(json!({"a": i64::MAX, "b": 2})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("overflows"));
    }

    #[tokio::test]
    async fn missing_operand_is_rejected() {
        let err = run(json!({"a": 2})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn schema_declares_two_integers() {
        let def = MultiplyTool.to_definition();
        assert_eq!(def.parameters["required"], json!(["a", "b"]));
        assert_eq!(def.parameters["properties"]["a"]["type"], "integer");
    }
}
