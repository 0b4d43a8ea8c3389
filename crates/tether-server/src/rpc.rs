//! JSON-RPC 2.0 message handler exposing a tool catalog.
//!
//! Every response travels back as a `message` frame on the session's push
//! channel. The inbound call itself is only acknowledged.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tether_core::{ToolCatalog, ToolError, ToolOutput};
use tracing::{debug, instrument, warn};

use crate::transport::{HandlerError, MessageHandler, Responder};

/// Protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// The message is not a JSON-RPC request.
pub const INVALID_REQUEST: i32 = -32600;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i32 = -32602;

/// JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be `"2.0"`.
    pub jsonrpc: String,
    /// Absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Serialize, PartialEq)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Request id, or `null` when it could not be determined.
    pub id: Value,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, PartialEq)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Serves `initialize`, `ping`, `tools/list` and `tools/call`.
pub struct ToolRpcHandler {
    catalog: Arc<dyn ToolCatalog>,
    server_name: String,
    server_version: String,
}

impl ToolRpcHandler {
    /// Create a handler over `catalog`.
    pub fn new(
        catalog: Arc<dyn ToolCatalog>,
        server_name: impl Into<String>,
        server_version: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            server_name: server_name.into(),
            server_version: server_version.into(),
        }
    }

    /// Produce the response for one request, or `None` for notifications.
    pub async fn respond(&self, message: Value) -> Option<JsonRpcResponse> {
        if is_client_response(&message) {
            debug!(id = %message.get("id").unwrap_or(&serde_json::Value::Null), "client response ignored");
            return None;
        }
        let is_notification = message.get("id").is_none();
        let request = match serde_json::from_value::<JsonRpcRequest>(message) {
            Ok(request) if request.jsonrpc == "2.0" => request,
            Ok(_) | Err(_) => {
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    INVALID_REQUEST,
                    "Invalid Request",
                ));
            }
        };

        if is_notification {
            debug!(method = %request.method, "notification received");
            return None;
        }

        let id = request.id.unwrap_or(Value::Null);
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, self.list_tools()),
            "prompts/list" => JsonRpcResponse::success(id, json!({ "prompts": [] })),
            "tools/call" => match self.call_tool(request.params).await {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err((code, message)) => JsonRpcResponse::error(id, code, message),
            },
            other => {
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {other}"))
            }
        };
        Some(response)
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {}, "prompts": {} },
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version,
            }
        })
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<Value> = self
            .catalog
            .list()
            .into_iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.parameters,
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, (i32, String)> {
        let params: ToolCallParams = params
            .ok_or_else(|| (INVALID_PARAMS, "Missing params".to_owned()))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| (INVALID_PARAMS, format!("Invalid params: {e}")))
            })?;

        let output = match self
            .catalog
            .call(&params.name, params.arguments.unwrap_or(Value::Null))
            .await
        {
            Ok(output) => output,
            Err(ToolError::UnknownTool { name }) => {
                return Err((INVALID_PARAMS, format!("Unknown tool: {name}")));
            }
            Err(ToolError::Validation { message }) => return Err((INVALID_PARAMS, message)),
            Err(e @ ToolError::Execution { .. }) => {
                warn!(tool = %params.name, error = %e, "tool execution failed");
                ToolOutput::error(e.to_string())
            }
        };

        Ok(json!({
            "content": [{ "type": "text", "text": output.text }],
            "isError": output.is_error,
        }))
    }
}

#[async_trait]
impl MessageHandler for ToolRpcHandler {
    #[instrument(skip_all, fields(session_id = %responder.session_id()))]
    async fn handle(&self, message: Value, responder: &mut Responder) -> Result<(), HandlerError> {
        if let Some(response) = self.respond(message).await {
            responder.push(&response).await?;
        }
        Ok(())
    }
}

/// A reply to something the server sent: it carries `result` or `error`
/// but no `method`.
fn is_client_response(message: &Value) -> bool {
    message.get("method").is_none()
        && (message.get("result").is_some() || message.get("error").is_some())
}
