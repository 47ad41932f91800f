//! Outlook MCP Server - Rust Implementation
//!
//! A Model Context Protocol (MCP) server for Outlook mail and calendar.
//! Provides tools for reading and sending emails and managing calendar events
//! via the Microsoft Graph API.

use clap::{Parser, Subcommand};

use outlook_mcp_server_rust::config::Config;
use outlook_mcp_server_rust::error::Result;
use outlook_mcp_server_rust::graph::auth::Authenticator;
use outlook_mcp_server_rust::mcp::server::McpServer;
use outlook_mcp_server_rust::mcp::tools::ToolHandler;
use outlook_mcp_server_rust::setup::{SetupOutcome, SetupWizard};

/// Outlook MCP Server
#[derive(Parser)]
#[command(name = "outlook-mcp-server")]
#[command(author, version, about = "Outlook MCP Server - A Model Context Protocol server for Outlook mail and calendar")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the Azure app credentials (run this first)
    Setup,

    /// Sign in ahead of time and cache the tokens
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::new()?;

    match cli.command {
        Some(Commands::Setup) => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            let outcome = SetupWizard::new(stdin.lock(), stdout.lock()).run(&config.config_path)?;
            if outcome == SetupOutcome::Declined {
                std::process::exit(0);
            }
        }
        Some(Commands::Auth) => {
            let authenticator = Authenticator::new(&config).await?;
            authenticator.authenticate_interactive().await?;
            eprintln!("Authentication completed successfully!");
        }
        None => {
            run_server(config).await?;
        }
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    if !config.record_exists() && config.access_token.is_none() {
        tracing::warn!(
            "Config file {} not found; tool calls will fail until 'outlook-mcp-server setup' is run",
            config.config_path.display()
        );
    }

    // The Graph client is built on the first tool call
    let mut server = McpServer::new(ToolHandler::new(config));
    server.run_stdio().await?;

    Ok(())
}
