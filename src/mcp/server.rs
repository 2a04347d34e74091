//! Tool server implementation
//!
//! Line-delimited JSON-RPC 2.0 over stdio. One request is fully handled
//! before the next line is read; `shutdown` is acknowledged and then ends
//! the loop.

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::gmail::client::GmailClient;
use crate::mcp::tools::ToolRegistry;
use crate::mcp::types::*;

const SERVER_NAME: &str = "gmail-bridge";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tool server over stdio
pub struct ToolServer {
    /// Tool registry
    registry: ToolRegistry,

    /// Whether the client has sent notifications/initialized
    initialized: bool,
}

impl ToolServer {
    /// Create a new server
    pub fn new(gmail_client: Arc<GmailClient>) -> Self {
        Self {
            registry: ToolRegistry::new(gmail_client),
            initialized: false,
        }
    }

    /// Run the server on stdio until EOF or shutdown
    pub async fn run_stdio(&mut self) -> Result<()> {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();

        let reader = stdin.lock();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let (response, stop) = self.handle_message(&line).await;
            if let Some(response) = response {
                let response_str = serde_json::to_string(&response)?;
                writeln!(stdout, "{}", response_str)?;
                stdout.flush()?;
            }
            if stop {
                break;
            }
        }

        Ok(())
    }

    /// Handle one incoming line; returns the response (if any) and whether
    /// the loop should stop
    async fn handle_message(&mut self, message: &str) -> (Option<JsonRpcResponse>, bool) {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!("unparseable request line: {}", e);
                return (
                    Some(JsonRpcResponse::error(
                        RequestId::Number(0),
                        JsonRpcError::parse_error(e.to_string()),
                    )),
                    false,
                );
            }
        };

        // Notifications carry no id and get no response
        let id = match request.id.clone() {
            Some(id) => id,
            None => {
                if request.method == methods::INITIALIZED {
                    self.initialized = true;
                }
                return (None, false);
            }
        };

        match request.method.as_str() {
            methods::INITIALIZE => {
                (Some(JsonRpcResponse::success(id, self.initialize_result())), false)
            }
            methods::PING => {
                (Some(JsonRpcResponse::success(id, serde_json::json!({}))), false)
            }
            methods::LIST_TOOLS => {
                let result = ListToolsResult {
                    tools: self.registry.list_tools(),
                };
                let value = serde_json::to_value(result)
                    .unwrap_or_else(|_| serde_json::json!({"tools": []}));
                (Some(JsonRpcResponse::success(id, value)), false)
            }
            methods::CALL_TOOL => {
                let result = self.handle_call_tool(&request).await;
                (Some(JsonRpcResponse::success(id, result)), false)
            }
            methods::SHUTDOWN => {
                (Some(JsonRpcResponse::success(id, serde_json::json!({}))), true)
            }
            _ => (
                Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::method_not_found(&request.method),
                )),
                false,
            ),
        }
    }

    fn initialize_result(&self) -> Value {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {}),
            },
        };

        serde_json::to_value(result).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Handle a tools/call request
    async fn handle_call_tool(&self, request: &JsonRpcRequest) -> Value {
        let params: CallToolParams = match request.params.as_ref() {
            Some(p) => match serde_json::from_value(p.clone()) {
                Ok(params) => params,
                Err(e) => {
                    let payload =
                        serde_json::json!({"error": format!("Invalid tool parameters: {}", e)});
                    return tool_result(&payload);
                }
            },
            None => {
                let payload = serde_json::json!({"error": "Missing tool parameters"});
                return tool_result(&payload);
            }
        };

        let payload = self.registry.call(&params.name, params.arguments).await;
        tool_result(&payload)
    }
}

fn tool_result(payload: &Value) -> Value {
    serde_json::to_value(CallToolResult::from_payload(payload))
        .unwrap_or_else(|_| serde_json::json!({}))
}
