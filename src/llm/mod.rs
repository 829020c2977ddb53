//! Assistant model abstraction.
//!
//! This module defines the conversation types exchanged with the assistant
//! model (messages made of text, tool-use and tool-result blocks) and the
//! `ModelClient` trait the orchestrator talks to. The Anthropic Messages API
//! client lives in [`anthropic`].

pub mod anthropic;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tools::ToolSpec;

/// Errors that can occur while invoking the model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The API answered with an error status
    #[error("Model API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The response could not be decoded
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    /// Configuration error (e.g., missing API key)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One content item of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block types this client does not handle (e.g. thinking)
    #[serde(other)]
    Unsupported,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Message payload: a bare string or a list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    /// Plain-text user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Assistant turn made of the given blocks.
    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// User message carrying the result of one tool invocation.
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
            }]),
        }
    }
}

/// One model invocation: conversation so far plus the full tool catalog.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    pub tools: Vec<ToolSpec>,
    pub messages: Vec<Message>,
}

/// Model answer: ordered content items.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub id: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl MessageResponse {
    pub fn new(content: Vec<ContentBlock>) -> Self {
        Self {
            id: String::new(),
            content,
            stop_reason: None,
        }
    }
}

/// Trait for assistant model backends.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send one request and return the model's answer.
    ///
    /// # Errors
    /// Returns `ModelError` if the call fails or the answer cannot be decoded
    async fn create_message(&self, request: &MessageRequest) -> ModelResult<MessageResponse>;
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn create_message(&self, request: &MessageRequest) -> ModelResult<MessageResponse> {
        (**self).create_message(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = MessageRequest {
            model: "test-model".to_string(),
            max_tokens: 2024,
            tools: vec![ToolSpec::new("t", "d", json!({"type": "object"}))],
            messages: vec![
                Message::user("hello"),
                Message::assistant(vec![
                    ContentBlock::text("let me check"),
                    ContentBlock::tool_use("call_1", "t", json!({"a": 1})),
                ]),
                Message::tool_result("call_1", "done"),
            ],
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "test-model",
                "max_tokens": 2024,
                "tools": [{"name": "t", "description": "d", "input_schema": {"type": "object"}}],
                "messages": [
                    {"role": "user", "content": "hello"},
                    {"role": "assistant", "content": [
                        {"type": "text", "text": "let me check"},
                        {"type": "tool_use", "id": "call_1", "name": "t", "input": {"a": 1}}
                    ]},
                    {"role": "user", "content": [
                        {"type": "tool_result", "tool_use_id": "call_1", "content": "done"}
                    ]}
                ]
            })
        );
    }

    #[test]
    fn test_response_parsing_tolerates_unknown_blocks() {
        let response: MessageResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "hi"},
                {"type": "tool_use", "id": "toolu_1", "name": "search_papers", "input": {"topic": "x"}}
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();

        assert_eq!(response.id, "msg_1");
        assert_eq!(response.content[0], ContentBlock::Unsupported);
        assert_eq!(response.content[1], ContentBlock::text("hi"));
        assert_eq!(
            response.content[2],
            ContentBlock::tool_use("toolu_1", "search_papers", json!({"topic": "x"}))
        );
        assert_eq!(response.stop_reason.as_deref(), Some("tool_use"));
    }
}
