//! Tool registry.
//!
//! Tools are declared with a [`ToolSpec`] (name, description, JSON input
//! schema) and backed by a [`ToolHandler`]. The registry advertises the
//! catalog to the model, binds model-supplied arguments against each tool's
//! schema, runs the handler and normalizes its [`ToolOutput`] into the text
//! that goes back into the conversation.

pub mod binding;
pub mod remote;
pub mod research;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::provider::ProviderError;
use crate::storage::StorageError;

pub use binding::{bind_arguments, ToolArguments};

/// Text returned for a tool call that produced nothing.
pub const EMPTY_RESULT_MESSAGE: &str = "Operation completed but didn't return any results.";

/// Errors raised while registering or executing tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The model asked for a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Two tools were registered under the same name
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    /// Arguments did not match the tool's input schema
    #[error("Invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The paper provider failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The metadata store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A remote tool server failed or answered with an error
    #[error("Remote tool error: {0}")]
    Remote(String),

    /// Other failures inside a tool implementation
    #[error("Tool execution failed: {0}")]
    Execution(String),
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Declaration of a callable tool, as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    /// Unique tool name
    pub name: String,

    /// Human-readable description surfaced to the model
    pub description: String,

    /// JSON-Schema-like object describing accepted arguments
    pub input_schema: Value,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// Value produced by a tool implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Nothing to report
    Empty,

    /// Ordered list of items, rendered comma-separated
    Sequence(Vec<String>),

    /// Key-value result, rendered as pretty JSON in insertion order
    Mapping(Map<String, Value>),

    /// Any other single value
    Scalar(Value),
}

impl ToolOutput {
    /// Render the output as the text sent back to the model.
    pub fn normalize(&self) -> String {
        match self {
            ToolOutput::Empty => EMPTY_RESULT_MESSAGE.to_string(),
            ToolOutput::Sequence(items) if items.is_empty() => EMPTY_RESULT_MESSAGE.to_string(),
            ToolOutput::Sequence(items) => items.join(", "),
            ToolOutput::Mapping(map) if map.is_empty() => EMPTY_RESULT_MESSAGE.to_string(),
            ToolOutput::Mapping(map) => format!("{:#}", Value::Object(map.clone())),
            ToolOutput::Scalar(Value::Null) => EMPTY_RESULT_MESSAGE.to_string(),
            ToolOutput::Scalar(Value::String(s)) if s.is_empty() => EMPTY_RESULT_MESSAGE.to_string(),
            ToolOutput::Scalar(Value::String(s)) => s.clone(),
            ToolOutput::Scalar(other) => other.to_string(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Scalar(Value::String(text))
    }
}

impl From<Vec<String>> for ToolOutput {
    fn from(items: Vec<String>) -> Self {
        ToolOutput::Sequence(items)
    }
}

/// Executable side of a tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with arguments already bound against its schema.
    async fn call(&self, args: ToolArguments) -> ToolResult<ToolOutput>;
}

struct RegisteredTool {
    spec: ToolSpec,
    handler: Arc<dyn ToolHandler>,
}

/// Catalog of tools available to the model.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// # Errors
    /// Returns `ToolError::DuplicateTool` if the name is already taken
    pub fn register(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> ToolResult<()> {
        if self.by_name.contains_key(&spec.name) {
            return Err(ToolError::DuplicateTool(spec.name));
        }
        self.by_name.insert(spec.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool { spec, handler });
        Ok(())
    }

    /// Tool catalog, in registration order.
    pub fn list_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name and normalize its output to text.
    ///
    /// # Errors
    /// `UnknownTool` for unregistered names, `InvalidArguments` when binding
    /// fails, or whatever the handler itself returns
    pub async fn execute(&self, name: &str, arguments: &Value) -> ToolResult<String> {
        let tool = self
            .by_name
            .get(name)
            .map(|ix| &self.tools[*ix])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let args = bind_arguments(&tool.spec, arguments).map_err(|reason| {
            ToolError::InvalidArguments {
                tool: name.to_string(),
                reason,
            }
        })?;

        debug!("Executing tool {} with args {}", name, args.as_value());
        let output = tool.handler.call(args).await?;
        Ok(output.normalize())
    }
}
