//! Conversation orchestration.
//!
//! The orchestrator drives one query to completion. It seeds the conversation
//! with the user's text, then alternates between calling the model (always
//! with the full tool catalog) and executing whatever tools the model asks
//! for, until the model answers with plain text.
//!
//! ```text
//! AWAITING_MODEL --(single text item)--> DONE
//! AWAITING_MODEL --(tool_use items)----> HANDLING_TOOL_CALLS --> AWAITING_MODEL
//! ```
//!
//! Text is handed to a [`ChatObserver`] as soon as it arrives, so the REPL can
//! print intermediate remarks ("Let me search for that...") before the tools
//! run.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::llm::{ContentBlock, Message, MessageRequest, ModelClient, ModelError};
use crate::tools::{ToolError, ToolRegistry};

/// Errors that abort a query.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The model call failed
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A requested tool failed or does not exist
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The model kept requesting tools past the turn ceiling
    #[error("Turn limit exceeded: no final answer after {0} model calls")]
    TurnLimitExceeded(usize),
}

/// Result type for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Receives conversation events as they happen.
pub trait ChatObserver: Send {
    /// Text produced by the model.
    fn on_text(&mut self, text: &str);

    fn on_tool_call(&mut self, _name: &str, _input: &Value) {}

    fn on_tool_result(&mut self, _name: &str, _result: &str) {}
}

/// Outcome of a completed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    /// Final text answer
    pub answer: String,

    /// Number of model invocations it took
    pub model_calls: usize,
}

/// Drives the model/tool loop for single queries.
///
/// Conversation state lives only for the duration of one
/// [`process_query`](Orchestrator::process_query) call.
pub struct Orchestrator<'a, M>
where
    M: ModelClient,
{
    model: M,
    tools: &'a ToolRegistry,
    config: &'a ChatConfig,
}

impl<'a, M> Orchestrator<'a, M>
where
    M: ModelClient,
{
    pub fn new(model: M, tools: &'a ToolRegistry, config: &'a ChatConfig) -> Self {
        Self {
            model,
            tools,
            config,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.tools
    }

    /// Run `query` to completion.
    ///
    /// # Errors
    /// Any model or tool failure aborts the query, as does reaching
    /// `max_turns` model calls without a final answer
    pub async fn process_query(
        &self,
        query: &str,
        observer: &mut dyn ChatObserver,
    ) -> ChatResult<ChatOutcome> {
        let catalog = self.tools.list_specs();
        let mut messages = vec![Message::user(query)];

        for turn in 1..=self.config.max_turns {
            let request = MessageRequest {
                model: self.config.model.clone(),
                max_tokens: self.config.max_tokens,
                tools: catalog.clone(),
                messages: messages.clone(),
            };
            let response = self.model.create_message(&request).await?;
            debug!("Turn {}: {} content blocks", turn, response.content.len());

            if let [ContentBlock::Text { text }] = response.content.as_slice() {
                observer.on_text(text);
                return Ok(ChatOutcome {
                    answer: text.clone(),
                    model_calls: turn,
                });
            }

            let blocks: Vec<ContentBlock> = response
                .content
                .into_iter()
                .filter(|block| !matches!(block, ContentBlock::Unsupported))
                .collect();

            let has_tool_calls = blocks
                .iter()
                .any(|block| matches!(block, ContentBlock::ToolUse { .. }));
            if !has_tool_calls {
                // Nothing left to do: the text items form the answer.
                let texts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                for text in &texts {
                    observer.on_text(text);
                }
                return Ok(ChatOutcome {
                    answer: texts.join("\n"),
                    model_calls: turn,
                });
            }

            messages.push(Message::assistant(blocks.clone()));

            for block in blocks {
                match block {
                    ContentBlock::Text { text } => observer.on_text(&text),
                    ContentBlock::ToolUse { id, name, input } => {
                        info!("Calling tool {} with args {}", name, input);
                        observer.on_tool_call(&name, &input);
                        let result = self.tools.execute(&name, &input).await?;
                        observer.on_tool_result(&name, &result);
                        messages.push(Message::tool_result(id, result));
                    }
                    _ => {}
                }
            }
        }

        Err(ChatError::TurnLimitExceeded(self.config.max_turns))
    }
}
