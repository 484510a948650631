//! MCP JSON-RPC server over newline-delimited stdio.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::client::ClientProvider;
use crate::navigation::Navigator;

/// MCP Protocol version
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "superops-mcp";

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

const INSTRUCTIONS: &str = "SuperOps PSA/RMM gateway. Tools are grouped into domains: \
clients, tickets, assets, technicians and custom. Call 'navigate' with a domain to see \
its tools and 'back' to return to domain selection. Use 'test_connection' to check \
credentials.";

#[derive(Error, Debug)]
pub enum McpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
}

impl McpError {
    fn code(&self) -> i32 {
        match self {
            McpError::InvalidParams(_) => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        }
    }
}

/// JSON-RPC Request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC Response. `id` is `null` when the request id could not be read.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
                data: None,
            }),
        }
    }
}

/// Server-initiated message with no id.
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
}

impl JsonRpcNotification {
    pub fn tools_list_changed() -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: "notifications/tools/list_changed".to_string(),
        }
    }
}

/// SuperOps MCP gateway
pub struct GatewayServer {
    navigator: Navigator,
    list_changed: AtomicBool,
}

impl GatewayServer {
    pub fn new(navigator: Navigator) -> Self {
        Self {
            navigator,
            list_changed: AtomicBool::new(false),
        }
    }

    pub fn with_provider(provider: ClientProvider) -> Self {
        Self::new(Navigator::new(provider))
    }

    fn handle_initialize(&self, params: &Value) -> Value {
        if let Some(client) = params.get("clientInfo") {
            info!(
                "Client connected: {} {}",
                client.get("name").and_then(Value::as_str).unwrap_or("unknown"),
                client.get("version").and_then(Value::as_str).unwrap_or("")
            );
        }
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": true }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            },
            "instructions": INSTRUCTIONS
        })
    }

    fn handle_tools_list(&self) -> Value {
        json!({
            "tools": self.navigator.list_tools()
        })
    }

    async fn handle_tools_call(&self, params: &Value) -> Result<Value, McpError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::InvalidParams("Missing tool name".to_string()))?;

        let arguments = match params.get("arguments") {
            Some(Value::Null) | None => json!({}),
            Some(args) => args.clone(),
        };

        debug!("Calling tool: {} with args: {}", name, arguments);

        let outcome = self.navigator.call_tool(name, &arguments).await;
        if outcome.tools_changed {
            self.list_changed.store(true, Ordering::SeqCst);
        }
        Ok(serde_json::to_value(outcome.result)?)
    }

    /// Handle a single JSON-RPC message. Notifications get no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling request: {}", request.method);

        if request.id.is_none() {
            match request.method.as_str() {
                "initialized" | "notifications/initialized" => info!("Client initialized"),
                other => debug!("Ignoring notification: {}", other),
            }
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => {
                JsonRpcResponse::success(request.id, self.handle_initialize(&request.params))
            }
            "tools/list" => JsonRpcResponse::success(request.id, self.handle_tools_list()),
            "tools/call" => match self.handle_tools_call(&request.params).await {
                Ok(result) => JsonRpcResponse::success(request.id, result),
                Err(e) => JsonRpcResponse::error(request.id, e.code(), &e.to_string()),
            },
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            _ => {
                warn!("Unknown method: {}", request.method);
                JsonRpcResponse::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    &format!("Method not found: {}", request.method),
                )
            }
        };
        Some(response)
    }

    /// Clear and return the pending tool-menu-changed flag.
    pub fn take_list_changed(&self) -> bool {
        self.list_changed.swap(false, Ordering::SeqCst)
    }

    /// Serve newline-delimited JSON-RPC until `reader` reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            let message: Value = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(e) => {
                    error!("Failed to parse request: {}", e);
                    let response = JsonRpcResponse::error(None, PARSE_ERROR, "Parse error");
                    write_message(&mut writer, &response).await?;
                    continue;
                }
            };

            let id = message.get("id").cloned();
            let request: JsonRpcRequest = match serde_json::from_value(message) {
                Ok(req) => req,
                Err(e) => {
                    warn!("Invalid request: {}", e);
                    let response = JsonRpcResponse::error(id, INVALID_REQUEST, "Invalid Request");
                    write_message(&mut writer, &response).await?;
                    continue;
                }
            };

            if let Some(response) = self.handle_request(request).await {
                write_message(&mut writer, &response).await?;
            }
            if self.take_list_changed() {
                write_message(&mut writer, &JsonRpcNotification::tools_list_changed()).await?;
            }
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    /// Run the MCP server over stdio
    pub async fn run_stdio(&self) -> Result<(), McpError> {
        info!("MCP server ready, listening on stdio...");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}

async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), McpError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(message)?;
    debug!("Sending: {}", json);
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
