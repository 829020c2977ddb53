//! MCP Paper Chat - a tool-calling research assistant.
//!
//! This library provides the pieces of a chatbot that answers questions about
//! research papers by letting an assistant model call tools: a topic search
//! against arXiv whose results are cached on disk, and a lookup of cached
//! paper metadata.
//!
//! # Architecture
//!
//! - **models**: Core data structures (PaperRecord, TopicSummary)
//! - **storage**: Topic-partitioned JSON metadata store
//! - **provider**: Paper search providers (arXiv)
//! - **tools**: Tool catalog, argument binding, research and remote tools
//! - **llm**: Conversation types and the Anthropic model client
//! - **chat**: The model/tool orchestration loop
//! - **server**: Line-delimited JSON tool server
//! - **config**: Chat settings and the server configuration file
//!
//! # Workflow
//!
//! 1. Read a query from the user
//! 2. Send it to the model together with the tool catalog
//! 3. Execute each tool call the model makes and feed results back
//! 4. Print the model's final text answer
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mcp_paper_chat::{
//!     chat::{ChatObserver, Orchestrator}, config::ChatConfig, llm::anthropic::AnthropicClient,
//!     provider::arxiv::ArxivProvider, storage::json::JsonFileStore,
//!     tools::{research::register_research_tools, ToolRegistry},
//! };
//!
//! struct Print;
//!
//! impl ChatObserver for Print {
//!     fn on_text(&mut self, text: &str) {
//!         println!("{}", text);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tools = ToolRegistry::new();
//!     register_research_tools(
//!         &mut tools,
//!         Arc::new(ArxivProvider::new()?),
//!         Arc::new(JsonFileStore::new("papers")),
//!     )?;
//!
//!     let config = ChatConfig::default();
//!     let model = AnthropicClient::new(std::env::var("ANTHROPIC_API_KEY")?)?;
//!     let orchestrator = Orchestrator::new(model, &tools, &config);
//!
//!     let outcome = orchestrator
//!         .process_query("Find papers on graph neural networks", &mut Print)
//!         .await?;
//!     println!("Answered in {} model calls", outcome.model_calls);
//!     Ok(())
//! }
//! ```

// Public modules
pub mod chat;
pub mod config;
pub mod llm;
pub mod models;
pub mod provider;
pub mod server;
pub mod storage;
pub mod tools;

// Re-export commonly used types at the crate root
pub use chat::{ChatError, ChatObserver, ChatOutcome, Orchestrator};
pub use config::ChatConfig;
pub use llm::ModelClient;
pub use models::{PaperRecord, TopicSummary};
pub use provider::PaperProvider;
pub use storage::PaperStore;
pub use tools::{ToolOutput, ToolRegistry, ToolSpec};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
