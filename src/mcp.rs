//! MCP (Model Context Protocol) Server
//!
//! Manual JSON-RPC 2.0 over stdio, one message per line.
//!
//! # Methods
//! - `initialize` - server capabilities and metadata
//! - `tools/list` - the tool catalogue with input schemas
//! - `tools/call` - run a tool through the [`Router`]
//! - `ping` - liveness check
//!
//! Notifications (requests without an `id`) are accepted and never answered.
//! Tool failures are reported inside the tool result (`isError: true`), not as
//! JSON-RPC errors.
//!
//! # Usage
//!
//! Configure in an MCP client:
//! ```json
//! {
//!   "mcpServers": {
//!     "fmodata": {
//!       "command": "fmodata",
//!       "args": ["serve"]
//!     }
//!   }
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::tools::{tool_definitions, Router};

/// Protocol version answered when the client does not ask for one
pub const PROTOCOL_VERSION: &str = "2024-11-05";

// ============================================================================
// JSON-RPC 2.0 Structures
// ============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn result(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: None, error: Some(JsonRpcError { code, message }) }
    }
}

// ============================================================================
// MCP Server
// ============================================================================

/// Serve JSON-RPC on stdin/stdout until stdin closes
pub async fn serve(router: Router) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    tracing::info!("MCP server listening on stdio");
    serve_io(&router, stdin, stdout).await
}

/// Serve JSON-RPC over arbitrary line-based streams
pub async fn serve_io<R, W>(router: &Router, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = handle_line(router, &line).await {
            let response_json = serde_json::to_string(&response)?;
            writer.write_all(response_json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}

async fn handle_line(router: &Router, line: &str) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable JSON-RPC message");
            return Some(JsonRpcResponse::error(None, -32700, format!("Parse error: {e}")));
        }
    };

    if request.id.is_none() {
        tracing::debug!(method = %request.method, "Notification received");
        return None;
    }

    Some(handle_request(router, request).await)
}

/// Routes the request to the appropriate handler based on the method name
async fn handle_request(router: &Router, request: JsonRpcRequest) -> JsonRpcResponse {
    let result = match request.method.as_str() {
        "initialize" => Ok(handle_initialize(request.params.as_ref())),
        "ping" => Ok(serde_json::json!({})),
        "tools/list" => handle_list_tools(),
        "tools/call" => handle_call_tool(router, request.params).await,
        _ => {
            return JsonRpcResponse::error(
                request.id,
                -32601,
                format!("Method not found: {}", request.method),
            )
        }
    };

    match result {
        Ok(value) => JsonRpcResponse::result(request.id, value),
        Err(e) => JsonRpcResponse::error(request.id, -32602, e.to_string()),
    }
}

// ============================================================================
// MCP Protocol Handlers
// ============================================================================

fn handle_initialize(params: Option<&Value>) -> Value {
    let version = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);

    serde_json::json!({
        "protocolVersion": version,
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": "fmodata",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn handle_list_tools() -> Result<Value> {
    Ok(serde_json::json!({ "tools": tool_definitions() }))
}

async fn handle_call_tool(router: &Router, params: Option<Value>) -> Result<Value> {
    let params = params.ok_or_else(|| anyhow!("Missing params"))?;
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Missing tool name"))?;
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    let result = router.call(name, arguments).await;
    Ok(serde_json::to_value(result)?)
}
