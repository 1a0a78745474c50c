//! Dewey - Main Entry Point
//!
//! Serves the Notion TODO cache over MCP on stdio, or runs a single sync.
//! The actual implementation is in the `dewey_sync` library.

use anyhow::Result;
use clap::Parser;
use dewey_sync::{Config, DeweyServerHandler, formatting};
use mcp_attr::server::serve_stdio;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Dewey - view Notion TODOs through a fast Redis cache via Model Context Protocol
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run one full sync, print the report and exit
    #[arg(long)]
    sync_once: bool,

    /// Print the sync report as JSON (with --sync-once)
    #[arg(long, requires = "sync_once")]
    json: bool,

    /// Serve without syncing first
    #[arg(long)]
    no_initial_sync: bool,
}

fn init_tracing() {
    // stdout carries the MCP protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = Config::load(args.config.as_deref())?;
    let handler = DeweyServerHandler::new(&config)?;

    if args.sync_once {
        let report = handler.refresh().await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", formatting::format_sync_report(&report));
        }
        return Ok(());
    }

    if config.sync.on_start && !args.no_initial_sync {
        if let Err(e) = handler.refresh().await {
            warn!(error = %e, "Initial sync failed, serving whatever is cached");
        }
    }

    info!("🦕 Dewey is running!");
    serve_stdio(handler).await?;
    Ok(())
}
