//! Tools hosted by another process.
//!
//! A [`RemoteToolServer`] talks to a `research-server`-style process over its
//! stdin/stdout using the line protocol in [`crate::server`]. Every tool it
//! advertises can be mounted into the local [`ToolRegistry`], so the model
//! sees local and remote tools as one catalog.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{ToolArguments, ToolError, ToolHandler, ToolOutput, ToolRegistry, ToolResult, ToolSpec};
use crate::config::ServerSpec;
use crate::server::{ServerRequest, ServerResponse};

/// Default wait for a single response line.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(300);

type BoxedReader = Box<dyn AsyncBufRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Channel {
    writer: BoxedWriter,
    lines: Lines<BoxedReader>,

    /// Set once the stream can no longer be trusted to pair requests with
    /// responses (timeout, I/O failure, closed pipe)
    broken: Option<String>,
}

/// Connection to one tool server.
pub struct RemoteToolServer {
    name: String,
    channel: AsyncMutex<Channel>,
    response_timeout: Duration,
    // Held so the process lives as long as the connection
    _child: std::sync::Mutex<Option<Child>>,
}

impl RemoteToolServer {
    /// Launch the server described by `spec`.
    ///
    /// # Errors
    /// Returns `ToolError::Remote` if the process cannot be started
    pub fn spawn(name: &str, spec: &ServerSpec) -> ToolResult<Self> {
        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ToolError::Remote(format!("failed to start server {} ({}): {}", name, spec.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolError::Remote(format!("no stdin for server {}", name)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Remote(format!("no stdout for server {}", name)))?;

        info!("Started tool server {}: {} {:?}", name, spec.command, spec.args);
        let server = Self::from_io(name, BufReader::new(stdout), stdin);
        Ok(Self {
            _child: std::sync::Mutex::new(Some(child)),
            ..server
        })
    }

    /// Use an already-open byte stream pair as the connection.
    pub fn from_io<R, W>(name: &str, reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: BoxedReader = Box::new(reader);
        Self {
            name: name.to_string(),
            channel: AsyncMutex::new(Channel {
                writer: Box::new(writer),
                lines: reader.lines(),
                broken: None,
            }),
            response_timeout: RESPONSE_TIMEOUT,
            _child: std::sync::Mutex::new(None),
        }
    }

    /// Override how long to wait for each response.
    pub fn with_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn request(&self, request: &ServerRequest) -> ToolResult<Value> {
        let mut line = serde_json::to_string(request).map_err(|e| self.fault(e))?;
        line.push('\n');

        let mut channel = self.channel.lock().await;
        if let Some(reason) = &channel.broken {
            return Err(self.fault(format!("connection unusable after earlier failure: {}", reason)));
        }

        match self.exchange(&mut channel, &line).await {
            Ok(response) => self.response_value(response),
            Err(reason) => {
                // A late answer to this request may still arrive on the stream
                warn!("{}: marking connection broken: {}", self.name, reason);
                channel.broken = Some(reason.clone());
                Err(self.fault(reason))
            }
        }
    }

    /// Write one request line and read lines until a response parses.
    async fn exchange(&self, channel: &mut Channel, line: &str) -> Result<ServerResponse, String> {
        channel
            .writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| e.to_string())?;
        channel.writer.flush().await.map_err(|e| e.to_string())?;

        loop {
            let next = timeout(self.response_timeout, channel.lines.next_line())
                .await
                .map_err(|_| "timed out waiting for response".to_string())?
                .map_err(|e| e.to_string())?
                .ok_or_else(|| "connection closed".to_string())?;

            // Servers may print non-protocol lines; skip until a response parses.
            match serde_json::from_str::<ServerResponse>(&next) {
                Ok(response) => return Ok(response),
                Err(_) => debug!("{}: skipping non-protocol line {:?}", self.name, next),
            }
        }
    }

    fn response_value(&self, response: ServerResponse) -> ToolResult<Value> {
        if response.ok {
            Ok(response.result.unwrap_or(Value::Null))
        } else {
            Err(self.fault(
                response
                    .error
                    .unwrap_or_else(|| "unspecified error".to_string()),
            ))
        }
    }

    /// Fetch the server's tool catalog.
    pub async fn list_tools(&self) -> ToolResult<Vec<ToolSpec>> {
        let result = self.request(&ServerRequest::ListTools).await?;
        serde_json::from_value(result).map_err(|e| self.fault(format!("bad catalog: {}", e)))
    }

    /// Execute a tool on the server and return its normalized text.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult<String> {
        let result = self
            .request(&ServerRequest::CallTool {
                name: name.to_string(),
                arguments,
            })
            .await?;
        Ok(match result {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }

    fn fault(&self, reason: impl std::fmt::Display) -> ToolError {
        ToolError::Remote(format!("{}: {}", self.name, reason))
    }
}

/// Local handle for one tool hosted by a [`RemoteToolServer`].
pub struct RemoteTool {
    server: Arc<RemoteToolServer>,
    tool: String,
}

#[async_trait]
impl ToolHandler for RemoteTool {
    async fn call(&self, args: ToolArguments) -> ToolResult<ToolOutput> {
        let text = self.server.call_tool(&self.tool, args.into_value()).await?;
        Ok(ToolOutput::from(text))
    }
}

/// Register every tool advertised by `server`, returning how many were added.
///
/// # Errors
/// Fails if the catalog cannot be fetched or a tool name is already taken
pub async fn mount_remote_tools(
    registry: &mut ToolRegistry,
    server: Arc<RemoteToolServer>,
) -> ToolResult<usize> {
    let specs = server.list_tools().await?;
    let count = specs.len();
    for spec in specs {
        let tool = spec.name.clone();
        if let Err(e) = registry.register(
            spec,
            Arc::new(RemoteTool {
                server: Arc::clone(&server),
                tool: tool.clone(),
            }),
        ) {
            warn!("Cannot mount {} from {}: {}", tool, server.name(), e);
            return Err(e);
        }
    }
    info!("Mounted {} tools from {}", count, server.name());
    Ok(count)
}
