//! fmodata - FileMaker OData MCP Server
//!
//! Exposes the tables of a FileMaker Server database (OData v4) to AI agents as a
//! small set of MCP tools: querying and editing records, reading the schema, and
//! managing saved connections.
//!
//! # Architecture
//! Data flows leaves-first:
//! tool call → [`Router`] → [`SessionManager`] (current client) → [`ODataClient`]
//! → [`response`] shaping → [`ToolResult`].
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`client`] - OData URL building, requests and error normalization
//! - [`response`] - Record formatting and `$metadata` extraction
//! - [`config`] - Saved connections, settings and their persisted form
//! - [`session`] - Cached clients and the current selection
//! - [`tools`] - Tool catalogue and routing
//! - [`output`] - Tool result envelope
//! - [`mcp`] - JSON-RPC 2.0 stdio server
//! - [`logging`] - `tracing` subscriber setup

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod output;
pub mod response;
pub mod session;
pub mod tools;

pub use client::{
    BatchMethod, BatchOperation, BatchOutcome, ClientOptions, ODataClient, QueryOptions, Record,
    RecordOptions, RecordSet,
};
pub use config::{
    Connection, ConnectionParams, ConnectionRegistry, ConnectionStore, FileStore, MemoryStore,
    Settings,
};
pub use error::{FmodataError, Result};
pub use output::{TextContent, ToolResult};
pub use response::FieldInfo;
pub use session::{ClientHandle, ConnectionKey, SessionManager};
pub use tools::{tool_definitions, Router, ToolDefinition, ToolGroup};
