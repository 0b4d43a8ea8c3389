//! Tool catalog contract.
//!
//! The transport never knows which tools exist. It asks a [`ToolCatalog`] for
//! a snapshot once per channel (the `tools` frame) and the protocol handler
//! invokes tools through the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Public description of one invocable tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name (unique within a catalog).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: Value,
}

impl ToolDescriptor {
    /// Build a descriptor.
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Output of a tool execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    /// Text content returned to the caller.
    pub text: String,
    /// Whether the tool reports a domain-level failure.
    pub is_error: bool,
}

impl ToolOutput {
    /// A successful text output.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// A failed output carrying a message for the caller.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            is_error: true,
        }
    }
}

/// Errors raised when invoking a tool through a catalog.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool with that name is registered.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// The requested tool name.
        name: String,
    },

    /// Arguments failed validation.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// The tool failed while executing.
    #[error("execution failed: {message}")]
    Execution {
        /// Description of the failure.
        message: String,
    },
}

/// Source of invocable operations.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Snapshot of every tool currently available.
    fn list(&self) -> Vec<ToolDescriptor>;

    /// Invoke the tool named `name` with JSON `arguments`.
    async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError>;
}

/// A catalog with no tools.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyCatalog;

#[async_trait]
impl ToolCatalog for EmptyCatalog {
    fn list(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    async fn call(&self, name: &str, _arguments: Value) -> Result<ToolOutput, ToolError> {
        Err(ToolError::UnknownTool { name: name.into() })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn descriptor_wire_shape() {
        let d = ToolDescriptor::new("echo", "Echo input", json!({"type": "object"}));
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["name"], "echo");
        assert_eq!(v["description"], "Echo input");
        assert_eq!(v["parameters"]["type"], "object");
    }

    #[test]
    fn output_constructors() {
        assert!(!ToolOutput::text("hi").is_error);
        assert!(ToolOutput::error("bad").is_error);
    }

    #[test]
    fn error_display() {
        let err = ToolError::UnknownTool { name: "nope".into() };
        assert_eq!(err.to_string(), "unknown tool: nope");
    }

    #[tokio::test]
    async fn empty_catalog_has_nothing() {
        let catalog = EmptyCatalog;
        assert!(catalog.list().is_empty());
        let err = catalog.call("x", Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
    }
}
