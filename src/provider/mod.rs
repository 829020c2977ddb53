//! Paper provider module.
//!
//! This module defines the interface for searching an external paper index
//! by topic and includes an arXiv implementation.
//!
//! The `PaperProvider` trait abstracts the index, so the research tools can be
//! exercised against any backend (or a static fixture in tests) without
//! coupling to a specific API.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::PaperRecord;

pub mod arxiv;

/// Errors that can occur when searching a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The index answered with a non-success status
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// API rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Failed to parse the response format
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for searching an external paper index.
///
/// # Design Notes
///
/// - Results are returned in the index's relevance order, which callers must
///   preserve
/// - Providers do not retry; failures propagate to whoever invoked the search
#[async_trait]
pub trait PaperProvider: Send + Sync {
    /// Search the index for papers about `topic`.
    ///
    /// # Arguments
    /// * `topic` - Free-text search topic
    /// * `max_results` - Maximum number of papers to return
    ///
    /// # Errors
    /// Returns `ProviderError` if the index cannot be reached or its answer
    /// cannot be parsed
    async fn search(&self, topic: &str, max_results: usize) -> ProviderResult<Vec<PaperRecord>>;

    /// Human-readable name of this provider, for logging.
    fn name(&self) -> &str;
}
