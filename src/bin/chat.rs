//! Interactive chat binary entry point.
//!
//! This binary runs a read-eval-print loop: each line typed by the user is
//! sent to the assistant model, which may call the research tools (arXiv
//! search with on-disk caching, cached metadata lookup) before answering.
//!
//! # Examples
//!
//! Built-in research tools, papers cached under `./papers`:
//! ```bash
//! ANTHROPIC_API_KEY=... paper-chat
//! ```
//!
//! Tools mounted from the servers listed in a configuration file:
//! ```bash
//! paper-chat --servers server_config.json --log-file chat.log
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use mcp_paper_chat::{
    chat::{ChatObserver, Orchestrator},
    config::{load_server_config, ChatConfig, DEFAULT_MAX_TOKENS, DEFAULT_MAX_TURNS, DEFAULT_MODEL, DEFAULT_PAPERS_DIR},
    llm::{anthropic::AnthropicClient, ModelClient},
    models::TopicSummary,
    provider::arxiv::ArxivProvider,
    storage::{json::JsonFileStore, PaperStore},
    tools::{
        remote::{mount_remote_tools, RemoteToolServer},
        research::register_research_tools,
        ToolRegistry,
    },
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Chat with an assistant that can search and look up research papers
#[derive(Parser, Debug)]
#[command(
    name = "paper-chat",
    version,
    about = "Chat with an assistant that can search arXiv and recall saved papers",
    long_about = "Interactive research chatbot. The assistant can search arXiv for a topic \
                  (caching the results on disk) and look up saved paper metadata.

COMMANDS:
  <query>   Ask the assistant
  /tools    List the tools available to the assistant
  /topics   List cached topics
  quit      Exit"
)]
struct Args {
    /// Root directory of the paper metadata cache
    #[arg(long, env = "PAPER_DIR", default_value = DEFAULT_PAPERS_DIR, value_name = "DIR")]
    papers_dir: PathBuf,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Model identifier
    #[arg(long, env = "ANTHROPIC_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Maximum output tokens per model call
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS, value_name = "N")]
    max_tokens: u32,

    /// Maximum model calls per query
    #[arg(long, default_value_t = DEFAULT_MAX_TURNS, value_name = "N")]
    max_turns: usize,

    /// Mount tools from the servers in this config file instead of the built-in tools
    #[arg(long, value_name = "PATH")]
    servers: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,

    /// Also write logs to this file (rotated daily, date appended to the name)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

/// Setup logging to stderr, and to `log_file` when given
fn setup_logging(log_level: &str, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let appender = tracing_appender::rolling::daily(dir, file_name);
            Some(fmt::layer().with_ansi(false).with_writer(appender))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
    Ok(())
}

/// Prints the conversation to the terminal
struct ConsoleObserver;

impl ChatObserver for ConsoleObserver {
    fn on_text(&mut self, text: &str) {
        println!("\nAssistant: {}", text);
    }

    fn on_tool_call(&mut self, name: &str, input: &Value) {
        println!("\nCalling tool {} with args {}", name, input);
    }

    fn on_tool_result(&mut self, name: &str, result: &str) {
        debug!("Tool {} returned {} bytes", name, result.len());
    }
}

/// Build the tool catalog: remote servers if configured, built-in tools otherwise
async fn build_tools(args: &Args, store: Arc<dyn PaperStore>) -> Result<ToolRegistry> {
    let mut tools = ToolRegistry::new();

    match &args.servers {
        Some(path) => {
            let config = load_server_config(path)
                .await
                .with_context(|| format!("Failed to load server config: {}", path.display()))?;
            if config.servers.is_empty() {
                anyhow::bail!("No servers declared in {}", path.display());
            }
            for (name, spec) in &config.servers {
                let server = Arc::new(RemoteToolServer::spawn(name, spec)?);
                mount_remote_tools(&mut tools, server)
                    .await
                    .with_context(|| format!("Failed to mount tools from server {}", name))?;
            }
        }
        None => {
            let provider = ArxivProvider::new().with_context(|| "Failed to create arXiv client")?;
            register_research_tools(&mut tools, Arc::new(provider), store)?;
        }
    }

    info!("Tool catalog has {} tools", tools.len());
    Ok(tools)
}

/// Format the tool catalog as a table
fn format_tools_table(tools: &ToolRegistry) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Tool").add_attribute(Attribute::Bold),
        Cell::new("Description").add_attribute(Attribute::Bold),
    ]);
    for spec in tools.list_specs() {
        table.add_row(vec![Cell::new(spec.name), Cell::new(spec.description)]);
    }
    table.to_string()
}

/// Format cached topics as a table
fn format_topics_table(topics: &[TopicSummary]) -> String {
    if topics.is_empty() {
        return "No topics cached yet.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Topic").add_attribute(Attribute::Bold),
        Cell::new("Papers").add_attribute(Attribute::Bold),
    ]);
    for topic in topics {
        table.add_row(vec![Cell::new(&topic.topic), Cell::new(topic.paper_count)]);
    }
    table.to_string()
}

/// Run the read-eval-print loop until `quit` or end of input
async fn run_chat_loop<M: ModelClient>(
    orchestrator: Orchestrator<'_, M>,
    store: Arc<dyn PaperStore>,
) -> Result<()> {
    println!("\nMCP Chatbot Started!");
    println!("Type your queries or 'quit' to exit.");

    let mut rl = DefaultEditor::new().with_context(|| "Failed to create readline editor")?;

    loop {
        match rl.readline("\nQuery: ") {
            Ok(line) => {
                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                rl.add_history_entry(query).ok();

                if query.eq_ignore_ascii_case("quit") {
                    break;
                }

                match query {
                    "/tools" => println!("{}", format_tools_table(orchestrator.tools())),
                    "/topics" => match store.topics().await {
                        Ok(topics) => println!("{}", format_topics_table(&topics)),
                        Err(e) => eprintln!("Failed to list topics: {}", e),
                    },
                    _ => {
                        let mut observer = ConsoleObserver;
                        match orchestrator.process_query(query, &mut observer).await {
                            Ok(outcome) => {
                                debug!("Answered after {} model calls", outcome.model_calls)
                            }
                            Err(e) => {
                                error!("Query failed: {}", e);
                                println!("\nError: {}", e);
                            }
                        }
                        println!();
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, args.log_file.as_deref())?;

    let config = ChatConfig {
        model: args.model.clone(),
        max_tokens: args.max_tokens,
        max_turns: args.max_turns,
    };
    config.validate()?;

    info!("Using papers directory: {}", args.papers_dir.display());
    let store: Arc<dyn PaperStore> = Arc::new(JsonFileStore::new(&args.papers_dir));

    let tools = build_tools(&args, Arc::clone(&store)).await?;

    let model = AnthropicClient::new(args.api_key.clone())
        .with_context(|| "Failed to create Anthropic client")?;
    info!("Using model {} (max {} turns)", config.model, config.max_turns);

    let orchestrator = Orchestrator::new(model, &tools, &config);
    run_chat_loop(orchestrator, store).await
}
