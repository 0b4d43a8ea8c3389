use async_trait::async_trait;
use serde_json::{Value, json};
use tether_core::{ToolDescriptor, ToolError, ToolOutput};

use crate::traits::{Tool, require_str};

/// Returns its `text` argument unchanged.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "echo",
            "Echo the given text back to the caller.",
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Text to echo" }
                },
                "required": ["text"]
            }),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let text = require_str(&arguments, "text")?;
        Ok(ToolOutput::text(text))
    }
}
