//! Tools exposed to the model during agent runs.
//!
//! Each tool implements the [`Tool`] trait and is registered in a
//! [`ToolRegistry`], which the agent consults when the model asks for a call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use relay_core::error::{RelayError, Result};
use relay_core::types::ToolSpec;

pub mod calculator;

pub use calculator::CalculatorTool;

/// Output from a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// The core tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as exposed to the model (e.g., "calculator").
    fn name(&self) -> &str;

    /// Human-readable description for the model.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's input.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool. Malformed input must fail with
    /// [`RelayError::Validation`] before any work is done.
    async fn execute(&self, input: serde_json::Value) -> Result<ToolOutput>;
}

/// Registry of available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in tool.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CalculatorTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Tool declarations for the model request.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.parameters_schema(),
            })
            .collect()
    }

    /// Run a tool by name. Failures are reported back as error output so the
    /// model can see them; this never returns `Err`.
    pub async fn invoke(&self, name: &str, input: serde_json::Value) -> ToolOutput {
        let Some(tool) = self.get(name) else {
            warn!(tool = %name, "Model requested an unknown tool");
            return ToolOutput::error(format!("Unknown tool: {name}"));
        };

        debug!(tool = %name, %input, "Executing tool");
        match tool.execute(input).await {
            Ok(output) => output,
            Err(e @ RelayError::Validation(_)) => {
                warn!(tool = %name, %e, "Tool input rejected");
                ToolOutput::error(e.to_string())
            }
            Err(e) => {
                warn!(tool = %name, %e, "Tool execution error");
                ToolOutput::error(format!("Tool error: {e}"))
            }
        }
    }
}
