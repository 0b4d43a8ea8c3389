//! The trait every tool implements.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tether_core::{ToolDescriptor, ToolError, ToolOutput};

/// An invocable operation.
///
/// Each tool provides:
/// - **Schema** via [`descriptor()`](Tool::descriptor), published in the `tools` frame
/// - **Execution** via [`execute()`](Tool::execute), invoked with JSON arguments
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name. Must match `descriptor().name`.
    fn name(&self) -> &str;

    /// Public description and argument schema.
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute the tool with JSON arguments (always an object).
    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError>;
}

/// Fetch a required string argument.
pub fn require_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::Validation {
            message: format!("missing required string argument '{key}'"),
        })
}

/// Deserialize the whole argument object into a typed struct.
pub fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::Validation {
        message: format!("invalid arguments: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn require_str_present() {
        let args = json!({"text": "hi"});
        assert_eq!(require_str(&args, "text").unwrap(), "hi");
    }

    #[test]
    fn require_str_wrong_type() {
        let args = json!({"text": 3});
        let err = require_str(&args, "text").unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
    }

    #[test]
    fn require_str_missing() {
        let err = require_str(&json!({}), "text").unwrap_err();
        assert!(err.to_string().contains("'text'"));
    }

    #[test]
    fn parse_args_reports_validation_error() {
        #[derive(Debug, serde::Deserialize)]
        struct Args {
            #[allow(dead_code)]
            count: u32,
        }
        let err = parse_args::<Args>(json!({"count": "many"})).unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
        assert!(parse_args::<Args>(json!({"count": 2})).is_ok());
    }
}
