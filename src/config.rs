//! Runtime configuration.
//!
//! [`ChatConfig`] holds the per-process chat settings (model name, output
//! token budget, turn ceiling) and is built once by the binary. The server
//! configuration file lists the tool servers `paper-chat` should spawn and
//! mount:
//!
//! ```json
//! {"mcpServers": {"research": {"command": "research-server", "args": ["--papers-dir", "papers"]}}}
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default assistant model.
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

/// Default output token budget per model call.
pub const DEFAULT_MAX_TOKENS: u32 = 2024;

/// Default number of model invocations allowed per query.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Default root directory of the metadata store.
pub const DEFAULT_PAPERS_DIR: &str = "papers";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings shared by every query of a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Model identifier sent with every request
    pub model: String,

    /// Maximum output tokens per model call
    pub max_tokens: u32,

    /// Maximum model invocations per query
    pub max_turns: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

impl ChatConfig {
    /// Check that the settings can drive a conversation.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for an empty model name or zero budgets
    pub fn validate(&self) -> ConfigResult<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model name is empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be at least 1".to_string()));
        }
        if self.max_turns == 0 {
            return Err(ConfigError::Invalid("max_turns must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// How to launch one tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Contents of the server configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfigFile {
    /// Servers keyed by name, iterated in name order
    #[serde(rename = "mcpServers", default)]
    pub servers: BTreeMap<String, ServerSpec>,
}

impl ServerConfigFile {
    /// Parse a configuration document.
    pub fn from_json(text: &str) -> ConfigResult<Self> {
        let config: ServerConfigFile = serde_json::from_str(text)?;
        for (name, spec) in &config.servers {
            if spec.command.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "server `{}` has an empty command",
                    name
                )));
            }
        }
        Ok(config)
    }
}

/// Load the server configuration file at `path`.
pub async fn load_server_config(path: &Path) -> ConfigResult<ServerConfigFile> {
    let text = tokio::fs::read_to_string(path).await?;
    ServerConfigFile::from_json(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_chat_config_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.model, "claude-3-7-sonnet-20250219");
        assert_eq!(config.max_tokens, 2024);
        assert_eq!(config.max_turns, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chat_config_validation() {
        let config = ChatConfig {
            max_turns: 0,
            ..ChatConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ChatConfig {
            model: " ".to_string(),
            ..ChatConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_server_config() {
        let config = ServerConfigFile::from_json(
            r#"{
                "mcpServers": {
                    "research": {"command": "research-server", "args": ["--papers-dir", "papers"]},
                    "fetch": {"command": "uvx", "args": ["mcp-server-fetch"], "env": {"A": "1"}}
                }
            }"#,
        )
        .unwrap();

        let names: Vec<&String> = config.servers.keys().collect();
        assert_eq!(names, vec!["fetch", "research"]);
        assert_eq!(config.servers["research"].args, vec!["--papers-dir", "papers"]);
        assert!(config.servers["research"].env.is_empty());
        assert_eq!(config.servers["fetch"].env["A"], "1");
    }

    #[test]
    fn test_parse_server_config_rejects_empty_command() {
        let err = ServerConfigFile::from_json(r#"{"mcpServers": {"x": {"command": ""}}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        assert!(matches!(
            ServerConfigFile::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_load_server_config_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server_config.json");
        std::fs::write(&path, r#"{"mcpServers": {}}"#).unwrap();

        let config = load_server_config(&path).await.unwrap();
        assert!(config.servers.is_empty());

        let missing = load_server_config(&dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
