//! Connection and config group handlers

use serde_json::Value;

use crate::config::{ConnectionParams, PASSWORD_MASK};
use crate::error::{FmodataError, Result};
use crate::output::ToolResult;
use crate::session::{ConnectionKey, SessionManager};

use super::args::{AddConnectionArgs, ConnectArgs, NameArgs};
use super::{parse_args, require};

// ============================================================================
// Connection group
// ============================================================================

pub(super) async fn handle_connection_tool(
    session: &SessionManager,
    name: &str,
    args: Value,
) -> Result<ToolResult> {
    match name {
        "connect" => connect(session, parse_args(name, args)?).await,
        "set_connection" => {
            let args: NameArgs = parse_args(name, args)?;
            require("name", &args.name)?;
            set_connection(session, &args.name).await
        }
        "list_connections" => Ok(list_connections(session)),
        "get_current_connection" => Ok(current_connection(session)),
        _ => Err(FmodataError::validation_error(format!("Unknown connection tool: {name}"))),
    }
}

async fn connect(session: &SessionManager, args: ConnectArgs) -> Result<ToolResult> {
    let params = ConnectionParams::from(args);
    params.validate().map_err(|e| FmodataError::validation_error(e.message()))?;

    let client = session.create_ad_hoc_client(&params, None)?;
    if client.test_connection().await {
        Ok(ToolResult::success(format!(
            "Connected to {}/{} as {}",
            params.server, params.database, params.user
        )))
    } else {
        Ok(ToolResult::error(format!(
            "Failed to connect to {}/{}. Please check your credentials and server URL.",
            params.server, params.database
        )))
    }
}

async fn set_connection(session: &SessionManager, name: &str) -> Result<ToolResult> {
    session.set_current(name)?;

    if session.test_connection(name).await {
        Ok(ToolResult::success(format!("Switched to connection: {name}")))
    } else {
        Ok(ToolResult::success(format!(
            "Switched to connection: {name} (warning: connection test failed)"
        )))
    }
}

fn list_connections(session: &SessionManager) -> ToolResult {
    let connections = session.registry().list();
    if connections.is_empty() {
        return ToolResult::success(
            "No saved connections found. Use config_add_connection to save one or connect for a temporary connection.",
        );
    }

    let active = session.current_key();
    let lines: Vec<String> = connections
        .iter()
        .map(|conn| {
            let marker = match &active {
                Some(ConnectionKey::Named(current)) if *current == conn.name => " (active)",
                _ => "",
            };
            format!(
                "- {}{marker}: {}/{} (user: {})",
                conn.name, conn.params.server, conn.params.database, conn.params.user
            )
        })
        .collect();

    ToolResult::success(format!("Configured connections:\n{}", lines.join("\n")))
}

fn current_connection(session: &SessionManager) -> ToolResult {
    let Some((key, client)) = session.current() else {
        return ToolResult::success(
            "No active connection. Use connect or set_connection to establish a connection.",
        );
    };

    let label = match &key {
        ConnectionKey::Named(name) => name.clone(),
        ConnectionKey::AdHoc(_) => format!("{key} (inline/temporary)"),
    };

    ToolResult::success(format!(
        "Current connection: {label}\nServer: {}\nDatabase: {}\nUser: {}",
        client.server(),
        client.database(),
        client.user()
    ))
}

// ============================================================================
// Config group
// ============================================================================

pub(super) fn handle_config_tool(session: &SessionManager, name: &str, args: Value) -> Result<ToolResult> {
    let registry = session.registry();

    match name {
        "config_add_connection" => {
            let args: AddConnectionArgs = parse_args(name, args)?;
            registry.add(&args.name, args.params())?;
            Ok(ToolResult::success(format!(
                "Connection \"{}\" added successfully.\nServer: {}\nDatabase: {}\nUser: {}",
                args.name, args.server, args.database, args.user
            )))
        }
        "config_remove_connection" => {
            let args: NameArgs = parse_args(name, args)?;
            registry.remove(&args.name)?;
            session.evict(&args.name);
            Ok(ToolResult::success(format!("Connection \"{}\" removed successfully.", args.name)))
        }
        "config_list_connections" => {
            let connections = registry.list();
            if connections.is_empty() {
                return Ok(ToolResult::success(
                    "No saved connections found. Use config_add_connection to add a connection.",
                ));
            }

            let default = registry.default_name();
            let lines: Vec<String> = connections
                .iter()
                .map(|conn| {
                    let marker = if default.as_deref() == Some(conn.name.as_str()) { " (default)" } else { "" };
                    format!(
                        "- {}{marker}: {}/{} (user: {})",
                        conn.name, conn.params.server, conn.params.database, conn.params.user
                    )
                })
                .collect();

            Ok(ToolResult::success(format!("Saved connections:\n{}", lines.join("\n"))))
        }
        "config_get_connection" => {
            let args: NameArgs = parse_args(name, args)?;
            let Some(conn) = registry.get(&args.name) else {
                return Ok(ToolResult::error(format!("Connection \"{}\" not found.", args.name)));
            };

            let marker = if registry.default_name().as_deref() == Some(conn.name.as_str()) { " (default)" } else { "" };
            Ok(ToolResult::success(format!(
                "Connection: {}{marker}\nServer: {}\nDatabase: {}\nUser: {}\nPassword: {PASSWORD_MASK}",
                conn.name, conn.params.server, conn.params.database, conn.params.user
            )))
        }
        "config_set_default_connection" => {
            let args: NameArgs = parse_args(name, args)?;
            registry.set_default(&args.name)?;
            Ok(ToolResult::success(format!("Default connection set to: {}", args.name)))
        }
        _ => Err(FmodataError::validation_error(format!("Unknown config tool: {name}"))),
    }
}
