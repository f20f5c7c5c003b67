//! Arithmetic tool.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use relay_core::error::{RelayError, Result};

use crate::{Tool, ToolOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Typed calculator input. Unknown keys are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CalculatorInput {
    pub operation: Operation,
    pub a: f64,
    pub b: f64,
}

/// Apply `operation` to `a` and `b`.
///
/// Division by zero and results that JSON cannot represent are rejected.
pub fn calculate(operation: Operation, a: f64, b: f64) -> Result<f64> {
    let value = match operation {
        Operation::Add => a + b,
        Operation::Subtract => a - b,
        Operation::Multiply => a * b,
        Operation::Divide => {
            if b == 0.0 {
                return Err(RelayError::Validation("division by zero".into()));
            }
            a / b
        }
    };
    if !value.is_finite() {
        return Err(RelayError::Validation(format!(
            "result of {operation:?} is not a finite number"
        )));
    }
    Ok(value)
}

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Performs basic arithmetic"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide"]
                },
                "a": { "type": "number" },
                "b": { "type": "number" }
            },
            "required": ["operation", "a", "b"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let input: CalculatorInput = serde_json::from_value(input)
            .map_err(|e| RelayError::Validation(format!("invalid calculator input: {e}")))?;
        let value = calculate(input.operation, input.a, input.b)?;
        Ok(ToolOutput::ok(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations() {
        assert_eq!(calculate(Operation::Add, 5.0, 3.0).unwrap(), 8.0);
        assert_eq!(calculate(Operation::Subtract, 5.0, 3.0).unwrap(), 2.0);
        assert_eq!(calculate(Operation::Multiply, 5.0, 3.0).unwrap(), 15.0);
        assert_eq!(calculate(Operation::Divide, 5.0, 2.0).unwrap(), 2.5);
        assert_eq!(calculate(Operation::Add, -1.5, 0.25).unwrap(), -1.25);
    }

    #[test]
    fn test_divide_by_zero_rejected() {
        let err = calculate(Operation::Divide, 1.0, 0.0).unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_overflow_rejected() {
        let err = calculate(Operation::Multiply, f64::MAX, 10.0).unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }

    #[tokio::test]
    async fn test_execute_formats_integers_plainly() {
        let output = CalculatorTool
            .execute(json!({"operation": "add", "a": 5, "b": 3}))
            .await
            .unwrap();
        assert!(!output.is_error);
        assert_eq!(output.content, "8");
    }

    #[tokio::test]
    async fn test_execute_fractional() {
        let output = CalculatorTool
            .execute(json!({"operation": "divide", "a": 7, "b": 2}))
            .await
            .unwrap();
        assert_eq!(output.content, "3.5");
    }

    #[tokio::test]
    async fn test_invalid_operation_rejected() {
        let err = CalculatorTool
            .execute(json!({"operation": "power", "a": 2, "b": 8}))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_and_mistyped_fields_rejected() {
        let missing = CalculatorTool
            .execute(json!({"operation": "add", "a": 2}))
            .await
            .unwrap_err();
        assert!(matches!(missing, RelayError::Validation(_)));

        let mistyped = CalculatorTool
            .execute(json!({"operation": "add", "a": "2", "b": 3}))
            .await
            .unwrap_err();
        assert!(matches!(mistyped, RelayError::Validation(_)));
    }

    #[tokio::test]
    async fn test_extra_fields_ignored() {
        let output = CalculatorTool
            .execute(json!({"operation": "multiply", "a": 4, "b": 2.5, "note": "x"}))
            .await
            .unwrap();
        assert_eq!(output.content, "10");
    }
}
