//! Anthropic Messages API client.
//!
//! This module provides an implementation of the `ModelClient` trait that
//! posts requests to the Anthropic `/v1/messages` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{MessageRequest, MessageResponse, ModelClient, ModelError, ModelResult};

/// Default Messages API endpoint.
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic model client configuration.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,

    /// API key sent as `x-api-key`
    api_key: String,

    /// Full URL of the messages endpoint
    url: String,
}

impl AnthropicClient {
    /// Create a client for the public API.
    ///
    /// # Errors
    /// Returns `ModelError::ConfigError` if the key is empty or the HTTP
    /// client cannot be built
    pub fn new(api_key: String) -> ModelResult<Self> {
        Self::with_url(api_key, DEFAULT_ANTHROPIC_URL)
    }

    /// Create a client against a custom endpoint URL.
    pub fn with_url(api_key: String, url: &str) -> ModelResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ModelError::ConfigError("API key is empty".to_string()));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ModelError::ConfigError(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            url: url.to_string(),
        })
    }
}

/// Pull the human-readable message out of an API error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn create_message(&self, request: &MessageRequest) -> ModelResult<MessageResponse> {
        debug!(
            "Sending {} messages and {} tools to {}",
            request.messages.len(),
            request.tools.len(),
            request.model
        );

        let resp = self
            .http
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| ModelError::NetworkError(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ModelError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(ModelError::ApiError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let response: MessageResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        debug!(
            "Model response {} with {} content blocks",
            response.id,
            response.content.len()
        );
        Ok(response)
    }
}
