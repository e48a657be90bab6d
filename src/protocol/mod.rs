//! Line-delimited JSON-RPC 2.0 front end over a [`Dispatcher`].
//!
//! Each request frame is handled on its own task so a slow recognition never
//! blocks discovery or other calls. Responses may therefore come back out of
//! order; clients correlate them by `id`. A single writer task owns the
//! output stream.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{ResponseFormat, ServerConfig};
use crate::error::{OcrMcpError, Result};
use crate::tools::Dispatcher;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "ocrmcp";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Incoming frame. A missing `id` marks a notification. Frames whose
/// `jsonrpc` member is not `"2.0"` are rejected as invalid requests.
#[derive(Clone, Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub struct ToolServer {
    dispatcher: Dispatcher,
    format: ResponseFormat,
}

impl ToolServer {
    pub fn new(dispatcher: Dispatcher, format: ResponseFormat) -> Self {
        Self { dispatcher, format }
    }

    pub fn from_config(config: ServerConfig) -> Result<Self> {
        let format = config.response_format;
        Ok(Self::new(Dispatcher::from_config(config)?, format))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns `None` for notifications.
    pub async fn handle(&self, request: RpcRequest) -> Option<RpcResponse> {
        let Some(id) = request.id else {
            debug!(method = %request.method, "notification ignored");
            return None;
        };
        if request.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            let err = RpcError::new(
                INVALID_REQUEST,
                format!("invalid request: jsonrpc must be \"{JSONRPC_VERSION}\""),
            );
            warn!(method = %request.method, version = ?request.jsonrpc, "unsupported jsonrpc version");
            return Some(RpcResponse::error(id, err));
        }
        let response = match self.route(&request.method, request.params).await {
            Ok(result) => RpcResponse::result(id, result),
            Err(err) => {
                warn!(method = %request.method, code = err.code, message = %err.message, "request rejected");
                RpcResponse::error(id, err)
            }
        };
        Some(response)
    }

    /// Handles one raw frame and returns the serialized reply, if any.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => Some(RpcResponse::error(
                Value::Null,
                RpcError::new(PARSE_ERROR, format!("parse error: {e}")),
            )),
            Ok(frame) => {
                let id = frame.get("id").cloned().unwrap_or(Value::Null);
                match serde_json::from_value::<RpcRequest>(frame) {
                    Ok(request) => self.handle(request).await,
                    Err(e) => Some(RpcResponse::error(
                        id,
                        RpcError::new(INVALID_REQUEST, format!("invalid request: {e}")),
                    )),
                }
            }
        }?;
        match serde_json::to_string(&response) {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!(error = %e, "failed to serialize response");
                None
            }
        }
    }

    async fn route(&self, method: &str, params: Value) -> std::result::Result<Value, RpcError> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => {
                let tools = serde_json::to_value(self.dispatcher.list_tools())
                    .map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))?;
                Ok(json!({ "tools": tools }))
            }
            "tools/call" => {
                let params: CallParams = serde_json::from_value(params)
                    .map_err(|e| RpcError::new(INVALID_PARAMS, format!("invalid params: {e}")))?;
                let result = self.dispatcher.call(&params.name, params.arguments).await;
                Ok(json!({
                    "content": [{ "type": "text", "text": result.render(self.format) }],
                    "isError": !result.is_success(),
                }))
            }
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        }
    }

    /// Reads frames until EOF, answering each on its own task.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(frame) = rx.recv().await {
                writer.write_all(frame.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        info!(tools = self.dispatcher.registry().len(), "tool server listening");
        let mut in_flight = JoinSet::new();
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .context("failed to read request frame")?
        {
            let server = Arc::clone(&self);
            let tx = tx.clone();
            in_flight.spawn(async move {
                if let Some(frame) = server.handle_line(&line).await {
                    if tx.send(frame).is_err() {
                        warn!("response dropped, writer has stopped");
                    }
                }
            });
            reap_finished(&mut in_flight);
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "request task failed");
            }
        }
        drop(tx);
        writer_task
            .await
            .map_err(|e| OcrMcpError::Internal(format!("writer task failed: {e}")))?
            .context("failed to write response frame")?;
        info!("input closed, tool server stopped");
        Ok(())
    }

    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }
}

/// Drops finished request tasks without waiting on the ones still running.
fn reap_finished(in_flight: &mut JoinSet<()>) -> usize {
    let mut reaped = 0;
    while let Some(joined) = in_flight.try_join_next() {
        if let Err(e) = joined {
            error!(error = %e, "request task failed");
        }
        reaped += 1;
    }
    reaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn finished_request_tasks_are_reaped() {
        let mut in_flight = JoinSet::new();
        for _ in 0..8 {
            in_flight.spawn(async {});
        }
        in_flight.spawn(tokio::time::sleep(Duration::from_secs(30)));

        let mut reaped = 0;
        for _ in 0..100 {
            reaped += reap_finished(&mut in_flight);
            if reaped == 8 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(reaped, 8);
        assert_eq!(in_flight.len(), 1);
        in_flight.abort_all();
    }
}
