//! Research tools: topic search with caching, and cached metadata lookup.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{ToolArguments, ToolError, ToolHandler, ToolOutput, ToolRegistry, ToolResult, ToolSpec};
use crate::provider::PaperProvider;
use crate::storage::PaperStore;

/// Default number of papers fetched by `search_papers`.
pub const DEFAULT_MAX_RESULTS: u64 = 5;

pub fn search_papers_spec() -> ToolSpec {
    ToolSpec::new(
        "search_papers",
        "Search for papers on arXiv based on a topic and store their information.",
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "The topic to search for"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to retrieve",
                    "default": DEFAULT_MAX_RESULTS
                }
            },
            "required": ["topic"]
        }),
    )
}

pub fn extract_info_spec() -> ToolSpec {
    ToolSpec::new(
        "extract_info",
        "Search for information about a specific paper across all topic directories.",
        json!({
            "type": "object",
            "properties": {
                "paper_id": {
                    "type": "string",
                    "description": "The ID of the paper to look for"
                }
            },
            "required": ["paper_id"]
        }),
    )
}

/// Searches the provider and caches the results under the topic.
pub struct SearchPapersTool {
    provider: Arc<dyn PaperProvider>,
    store: Arc<dyn PaperStore>,
}

impl SearchPapersTool {
    pub fn new(provider: Arc<dyn PaperProvider>, store: Arc<dyn PaperStore>) -> Self {
        Self { provider, store }
    }
}

#[async_trait]
impl ToolHandler for SearchPapersTool {
    async fn call(&self, args: ToolArguments) -> ToolResult<ToolOutput> {
        let topic = args.str("topic")?;
        let max_results = args.u64("max_results")? as usize;
        if topic.trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: "search_papers".to_string(),
                reason: "`topic` must not be blank".to_string(),
            });
        }

        let papers = self.provider.search(topic, max_results).await?;
        let ids = self.store.upsert_from_search(topic, &papers).await?;
        info!(
            "search_papers: {} returned {} papers for {:?}",
            self.provider.name(),
            ids.len(),
            topic
        );

        Ok(ToolOutput::Sequence(ids))
    }
}

/// Looks a paper up in the cache, across every topic.
pub struct ExtractInfoTool {
    store: Arc<dyn PaperStore>,
}

impl ExtractInfoTool {
    pub fn new(store: Arc<dyn PaperStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for ExtractInfoTool {
    async fn call(&self, args: ToolArguments) -> ToolResult<ToolOutput> {
        let paper_id = args.str("paper_id")?;

        match self.store.lookup(paper_id).await? {
            Some(record) => match serde_json::to_value(&record) {
                Ok(Value::Object(map)) => Ok(ToolOutput::Mapping(map)),
                Ok(other) => Ok(ToolOutput::Scalar(other)),
                Err(e) => Err(ToolError::Execution(e.to_string())),
            },
            None => Ok(ToolOutput::from(format!(
                "There's no saved information related to paper {}.",
                paper_id
            ))),
        }
    }
}

/// Register `search_papers` and `extract_info` backed by `provider` and `store`.
pub fn register_research_tools(
    registry: &mut ToolRegistry,
    provider: Arc<dyn PaperProvider>,
    store: Arc<dyn PaperStore>,
) -> ToolResult<()> {
    registry.register(
        search_papers_spec(),
        Arc::new(SearchPapersTool::new(provider, Arc::clone(&store))),
    )?;
    registry.register(extract_info_spec(), Arc::new(ExtractInfoTool::new(store)))?;
    Ok(())
}
