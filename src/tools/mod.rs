//! Operation Router
//!
//! Maps a tool name and argument bag to a handler and wraps every outcome in a
//! [`ToolResult`]. Names are matched exactly against three groups:
//!
//! - Query: record and schema operations against the current client
//! - Connection: ad-hoc connect and switching between saved connections
//! - Config: managing the saved connection registry
//!
//! Query tools fail with "No active connection" until a client is selected.

pub mod args;
mod connections;
mod records;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{FmodataError, Result};
use crate::output::ToolResult;
use crate::session::SessionManager;

use args::{
    AddConnectionArgs, BatchArgs, ConnectArgs, CountRecordsArgs, CreateRecordArgs, DeleteRecordArgs,
    GetRecordArgs, GetRecordsArgs, NameArgs, NoArgs, QueryRecordsArgs, UpdateRecordArgs,
};

/// Tool group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolGroup {
    Query,
    Connection,
    Config,
}

impl ToolGroup {
    /// Group of a tool name, or `None` for unknown names
    pub fn classify(name: &str) -> Option<Self> {
        match name {
            "get_service_document" | "get_metadata" | "list_tables" | "query_records" | "get_record"
            | "get_records" | "count_records" | "create_record" | "update_record" | "delete_record"
            | "batch_operations" => Some(Self::Query),
            "connect" | "set_connection" | "list_connections" | "get_current_connection" => {
                Some(Self::Connection)
            }
            "config_add_connection"
            | "config_remove_connection"
            | "config_list_connections"
            | "config_get_connection"
            | "config_set_default_connection" => Some(Self::Config),
            _ => None,
        }
    }
}

/// Entry in the tool catalogue
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDefinition {
    fn new<T: JsonSchema>(name: &'static str, description: &'static str) -> Self {
        Self { name, description, input_schema: input_schema::<T>() }
    }
}

/// All tools, in the order they are advertised
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        // Query and metadata
        ToolDefinition::new::<NoArgs>(
            "get_service_document",
            "Get the OData service document listing the entity sets (tables) of the database",
        ),
        ToolDefinition::new::<NoArgs>(
            "get_metadata",
            "Get the OData $metadata document (EDMX/XML) describing tables and fields",
        ),
        ToolDefinition::new::<NoArgs>("list_tables", "List table names parsed from the metadata document"),
        ToolDefinition::new::<QueryRecordsArgs>(
            "query_records",
            "Query records from a table with OData $filter, $select, $orderby, paging, $expand and $count",
        ),
        ToolDefinition::new::<GetRecordArgs>("get_record", "Get a single record by its key"),
        ToolDefinition::new::<GetRecordsArgs>("get_records", "Get records from a table with simple paging"),
        ToolDefinition::new::<CountRecordsArgs>(
            "count_records",
            "Count records in a table, optionally matching a filter",
        ),
        ToolDefinition::new::<CreateRecordArgs>("create_record", "Create a new record in a table"),
        ToolDefinition::new::<UpdateRecordArgs>("update_record", "Update fields of an existing record"),
        ToolDefinition::new::<DeleteRecordArgs>("delete_record", "Delete a record"),
        ToolDefinition::new::<BatchArgs>(
            "batch_operations",
            "Run several GET/POST/PATCH/DELETE requests in order. Not atomic: each operation succeeds or fails independently",
        ),
        // Connection
        ToolDefinition::new::<ConnectArgs>(
            "connect",
            "Connect with inline credentials (temporary, not saved)",
        ),
        ToolDefinition::new::<NameArgs>("set_connection", "Switch to a saved connection by name"),
        ToolDefinition::new::<NoArgs>("list_connections", "List saved connections and mark the active one"),
        ToolDefinition::new::<NoArgs>("get_current_connection", "Show the active connection"),
        // Config
        ToolDefinition::new::<AddConnectionArgs>(
            "config_add_connection",
            "Save a new named connection",
        ),
        ToolDefinition::new::<NameArgs>("config_remove_connection", "Remove a saved connection"),
        ToolDefinition::new::<NoArgs>(
            "config_list_connections",
            "List saved connections (passwords masked)",
        ),
        ToolDefinition::new::<NameArgs>(
            "config_get_connection",
            "Show one saved connection (password masked)",
        ),
        ToolDefinition::new::<NameArgs>(
            "config_set_default_connection",
            "Set the connection used when none is selected",
        ),
    ]
}

/// Dispatches tool calls against one session
#[derive(Debug, Clone)]
pub struct Router {
    session: Arc<SessionManager>,
}

impl Router {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Run one tool; never fails, errors come back as error envelopes
    pub async fn call(&self, name: &str, args: Value) -> ToolResult {
        tracing::debug!(tool = name, "Handling tool call");

        let result = match ToolGroup::classify(name) {
            Some(ToolGroup::Query) => self.call_query(name, args).await,
            Some(ToolGroup::Connection) => connections::handle_connection_tool(&self.session, name, args).await,
            Some(ToolGroup::Config) => connections::handle_config_tool(&self.session, name, args),
            None => return ToolResult::error(format!("Unknown tool: {name}")),
        };

        result.unwrap_or_else(|e| {
            tracing::error!(tool = name, code = e.error_code(), error = %e, "Tool call failed");
            ToolResult::from_error(&e)
        })
    }

    async fn call_query(&self, name: &str, args: Value) -> Result<ToolResult> {
        let client = self.session.get_current_client()?.ok_or(FmodataError::NoActiveConnection)?;
        records::handle(&client, name, args).await
    }
}

/// Parse an argument bag; a missing bag counts as `{}`
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    let args = if args.is_null() { Value::Object(serde_json::Map::new()) } else { args };
    serde_json::from_value(args).map_err(|e| FmodataError::validation_error(format!("{tool}: {e}")))
}

/// Reject blank required strings
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(FmodataError::validation_error(format!("{field} must not be empty")));
    }
    Ok(())
}

fn input_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));

    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object.entry("properties").or_insert_with(|| serde_json::json!({}));
    }

    schema
}
