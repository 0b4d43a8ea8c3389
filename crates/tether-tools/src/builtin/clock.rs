use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tether_core::{ToolDescriptor, ToolError, ToolOutput};

use crate::traits::{Tool, parse_args};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TimeFormat {
    #[default]
    Rfc3339,
    Unix,
}

#[derive(Debug, Deserialize)]
struct ClockArgs {
    #[serde(default)]
    format: TimeFormat,
}

/// Reports the server's current UTC time.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "current_time",
            "Current server time in UTC.",
            json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "enum": ["rfc3339", "unix"],
                        "description": "Output format (default rfc3339)"
                    }
                }
            }),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: ClockArgs = parse_args(arguments)?;
        let now = Utc::now();
        let text = match args.format {
            TimeFormat::Rfc3339 => now.to_rfc3339_opts(SecondsFormat::Millis, true),
            TimeFormat::Unix => now.timestamp().to_string(),
        };
        Ok(ToolOutput::text(text))
    }
}
