//! fmodata CLI Entry Point
//!
//! Subcommands:
//! - `serve` (default) - MCP server over stdio
//! - `tools` - print the tool catalogue
//! - `config` - manage saved connections
//! - `test` - check that a saved connection answers
//!
//! stdout carries JSON-RPC (serve) or command output; logs go to stderr.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::process::ExitCode;
use std::sync::Arc;

use fmodata::config::{ConnectionRegistry, FileStore, TransportKind};
use fmodata::logging::{init_logging, LogSettings};
use fmodata::{mcp, tool_definitions, Router, SessionManager, ToolResult};

/// fmodata - FileMaker OData MCP server
#[derive(Parser)]
#[command(name = "fmodata")]
#[command(about = "MCP server exposing FileMaker Server OData tables to AI agents")]
#[command(version)]
struct Cli {
    /// Log filter directive, overriding FMODATA_LOG and RUST_LOG (e.g. "fmodata=debug")
    #[arg(long, global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server over stdio (default)
    Serve,

    /// Print the tool catalogue as JSON
    Tools,

    /// Manage saved connections
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Test a saved connection (the default one when no name is given)
    Test { name: Option<String> },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Save a new connection
    Add {
        name: String,
        #[arg(long)]
        server: String,
        #[arg(long)]
        database: String,
        #[arg(long)]
        user: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Remove a saved connection
    Remove { name: String },

    /// List saved connections
    List,

    /// Show one saved connection
    Get { name: String },

    /// Set the default connection
    SetDefault { name: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "fmodata failed");
            eprintln!("{}", json!({ "ok": false, "error": format!("{e:#}") }));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let store = FileStore::default_location()?;
    let config_path = store.path().to_path_buf();
    let registry = Arc::new(ConnectionRegistry::open(store)?);
    let settings = registry.stored_settings().with_overrides(|key| std::env::var(key).ok());

    let mut log_settings = LogSettings::new(config_path.with_file_name("logs"), settings.log_file);
    if let Some(filter) = cli.log_filter {
        log_settings = log_settings.with_filter(filter);
    }
    let _guard = init_logging(&log_settings);
    tracing::debug!(path = %config_path.display(), "Loaded connection registry");

    for problem in settings.validate() {
        tracing::warn!(%problem, "Configuration problem");
    }

    let session = Arc::new(SessionManager::new(registry, settings.remote.client_options()));
    let router = Router::new(Arc::clone(&session));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if settings.server.transport != TransportKind::Stdio {
                tracing::warn!(
                    transport = settings.server.transport.as_str(),
                    host = %settings.server.host,
                    port = settings.server.port,
                    "Only stdio is supported, falling back to stdio"
                );
            }

            if let Some(baseline) = settings.remote.connection() {
                session.create_ad_hoc_client(&baseline, None)?;
                tracing::info!(
                    server = %baseline.server,
                    database = %baseline.database,
                    "Opened baseline connection from environment"
                );
            }

            mcp::serve(router).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&tool_definitions())?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { action } => {
            let (tool, args) = config_call(action)?;
            Ok(print_result(&router.call(tool, args).await))
        }
        Commands::Test { name } => {
            let name = match name {
                Some(name) => name,
                None => {
                    session
                        .registry()
                        .default_name()
                        .ok_or_else(|| anyhow!("No default connection configured"))?
                }
            };

            let ok = session.test_connection(&name).await;
            println!("{}", json!({ "connection": name, "ok": ok }));
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

/// Map a `config` subcommand onto its tool call
fn config_call(action: ConfigAction) -> anyhow::Result<(&'static str, serde_json::Value)> {
    Ok(match action {
        ConfigAction::Add { name, server, database, user, password } => {
            let password = match password {
                Some(password) => password,
                None => dialoguer::Password::new()
                    .with_prompt(format!("Password for {user}"))
                    .interact()
                    .context("Could not read password")?,
            };
            (
                "config_add_connection",
                json!({ "name": name, "server": server, "database": database, "user": user, "password": password }),
            )
        }
        ConfigAction::Remove { name } => ("config_remove_connection", json!({ "name": name })),
        ConfigAction::List => ("config_list_connections", json!({})),
        ConfigAction::Get { name } => ("config_get_connection", json!({ "name": name })),
        ConfigAction::SetDefault { name } => ("config_set_default_connection", json!({ "name": name })),
    })
}

fn print_result(result: &ToolResult) -> ExitCode {
    if result.is_error {
        eprintln!("{}", result.text());
        ExitCode::FAILURE
    } else {
        println!("{}", result.text());
        ExitCode::SUCCESS
    }
}
