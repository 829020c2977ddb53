//! Research tool server entry point.
//!
//! Serves `search_papers` and `extract_info` over stdin/stdout using the
//! line-delimited JSON protocol of `mcp_paper_chat::server`. Logs go to
//! stderr so stdout carries protocol traffic only.
//!
//! # Examples
//!
//! ```bash
//! echo '{"method":"list_tools"}' | research-server --papers-dir papers
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mcp_paper_chat::{
    config::DEFAULT_PAPERS_DIR,
    provider::arxiv::ArxivProvider,
    server::ToolServer,
    storage::json::JsonFileStore,
    tools::{research::register_research_tools, ToolRegistry},
};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Research tool server speaking line-delimited JSON on stdio
#[derive(Parser, Debug)]
#[command(name = "research-server", version, about = "Serve the research tools over stdio")]
struct Args {
    /// Root directory of the paper metadata cache
    #[arg(long, env = "PAPER_DIR", default_value = DEFAULT_PAPERS_DIR, value_name = "DIR")]
    papers_dir: PathBuf,

    /// Override the arXiv API endpoint
    #[arg(long, value_name = "URL")]
    arxiv_url: Option<String>,

    /// Logging verbosity level
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    log_level: String,
}

fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);

    let provider = match &args.arxiv_url {
        Some(url) => ArxivProvider::with_endpoint(url),
        None => ArxivProvider::new(),
    }
    .with_context(|| "Failed to create arXiv client")?;

    let store = JsonFileStore::new(&args.papers_dir);
    info!("Using papers directory: {}", store.root().display());

    let mut registry = ToolRegistry::new();
    register_research_tools(&mut registry, Arc::new(provider), Arc::new(store))?;

    let server = ToolServer::new(registry);
    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .with_context(|| "Tool server stopped")?;

    Ok(())
}
