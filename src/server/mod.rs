//! Line-delimited JSON tool server.
//!
//! This module exposes a [`ToolRegistry`] to other processes. Each request
//! and each response is one JSON object on its own line:
//!
//! ```text
//! -> {"method":"list_tools"}
//! <- {"ok":true,"result":[{"name":"search_papers","description":"...","input_schema":{...}}]}
//! -> {"method":"call_tool","name":"extract_info","arguments":{"paper_id":"2401.00001v1"}}
//! <- {"ok":true,"result":"{\n  \"id\": ..."}
//! <- {"ok":false,"error":"Unknown tool: nope"}
//! ```
//!
//! `call_tool` results are the normalized tool text, so a client can pass them
//! straight back into a conversation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::tools::ToolRegistry;

/// Errors that stop the server loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Reading requests or writing responses failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A response could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Request sent to a tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ServerRequest {
    /// Return the tool catalog
    ListTools,

    /// Execute one tool
    CallTool {
        name: String,
        #[serde(default)]
        arguments: Value,
    },
}

/// Response returned by a tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServerResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Serves a tool registry over a line-oriented byte stream.
pub struct ToolServer {
    registry: ToolRegistry,
}

impl ToolServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Answer one decoded request.
    pub async fn handle(&self, request: ServerRequest) -> ServerResponse {
        match request {
            ServerRequest::ListTools => match serde_json::to_value(self.registry.list_specs()) {
                Ok(catalog) => ServerResponse::ok(catalog),
                Err(e) => ServerResponse::err(e.to_string()),
            },
            ServerRequest::CallTool { name, arguments } => {
                match self.registry.execute(&name, &arguments).await {
                    Ok(text) => ServerResponse::ok(Value::String(text)),
                    Err(e) => {
                        warn!("Tool {} failed: {}", name, e);
                        ServerResponse::err(e.to_string())
                    }
                }
            }
        }
    }

    /// Answer one raw request line.
    pub async fn handle_line(&self, line: &str) -> ServerResponse {
        match serde_json::from_str::<ServerRequest>(line) {
            Ok(request) => {
                debug!("Request: {:?}", request);
                self.handle(request).await
            }
            Err(e) => ServerResponse::err(format!("Invalid request: {}", e)),
        }
    }

    /// Read requests from `reader` until end of input, answering each on
    /// `writer`. Blank lines are ignored.
    ///
    /// # Errors
    /// Returns `ServerError` if the underlying stream fails
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> ServerResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Serving {} tools", self.registry.len());
        let mut lines = reader.lines();
        let mut handled = 0usize;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = self.handle_line(line).await;
            let mut encoded = serde_json::to_string(&response)?;
            encoded.push('\n');
            writer.write_all(encoded.as_bytes()).await?;
            writer.flush().await?;
            handled += 1;
        }

        info!("Input closed after {} requests", handled);
        Ok(())
    }
}
