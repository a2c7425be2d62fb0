//! Environment-Sourced Settings
//!
//! Settings are read once at startup. The config file provides the base values and the
//! environment overrides them.
//!
//! # Variables
//! - `FM_SERVER`, `FM_DATABASE`, `FM_USER`, `FM_PASSWORD` - baseline remote connection
//! - `FM_VERIFY_SSL` - `true`/`false` (case-insensitive), default `true`
//! - `FM_TIMEOUT` - request timeout in milliseconds, default `30000`
//! - `MCP_TRANSPORT`, `MCP_PORT`, `MCP_HOST` - outer protocol server settings
//! - `MCP_LOG_FILE` - `true` enables file logging

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::client::ClientOptions;
use crate::config::ConnectionParams;

/// Default request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default port for network transports
pub const DEFAULT_PORT: u32 = 3000;

/// Transport used by the outer MCP server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON-RPC over stdin/stdout
    #[default]
    Stdio,
    /// Plain HTTP
    Http,
    /// HTTP over TLS
    Https,
}

impl TransportKind {
    /// Parse a transport name (case-insensitive)
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" => Some(Self::Stdio),
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    /// Get the transport name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Outer protocol server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Transport kind
    pub transport: TransportKind,

    /// Listen port (ignored for stdio). Kept wide so out-of-range values can be reported.
    pub port: u32,

    /// Listen host (ignored for stdio)
    pub host: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { transport: TransportKind::Stdio, port: DEFAULT_PORT, host: "localhost".to_string() }
    }
}

/// Baseline remote connection, outside the named registry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteDefaults {
    /// Server URL (e.g. `https://fms.example.com`)
    pub server: String,

    /// Database name
    pub database: String,

    /// Account name
    pub user: String,

    /// Password, only ever taken from the environment
    #[serde(skip_serializing)]
    pub password: String,

    /// Verify TLS certificates
    pub verify_ssl: bool,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RemoteDefaults {
    fn default() -> Self {
        Self {
            server: String::new(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
            verify_ssl: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl std::fmt::Debug for RemoteDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDefaults")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &crate::config::PASSWORD_MASK)
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl RemoteDefaults {
    /// Transport options every new client starts from
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions { verify_ssl: self.verify_ssl, timeout: Duration::from_millis(self.timeout_ms) }
    }

    /// The baseline credentials, when all four fields are present
    #[must_use]
    pub fn connection(&self) -> Option<ConnectionParams> {
        let complete = [&self.server, &self.database, &self.user, &self.password]
            .iter()
            .all(|field| !field.trim().is_empty());

        complete.then(|| ConnectionParams {
            server: self.server.clone(),
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        })
    }

    fn any_given(&self) -> bool {
        !(self.server.is_empty() && self.database.is_empty() && self.user.is_empty())
    }
}

/// Resolved process settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Outer server settings
    pub server: ServerSettings,

    /// Baseline remote connection and transport options
    pub remote: RemoteDefaults,

    /// Write logs to `<config dir>/logs/server.log` as well as stderr
    pub log_file: bool,
}

impl Settings {
    /// Settings from an arbitrary lookup on top of built-in defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::default().with_overrides(lookup)
    }

    /// Apply variables from `lookup` over the current values
    ///
    /// Unparseable numbers and unknown transport names leave the current value in place.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(server) = lookup("FM_SERVER") {
            self.remote.server = server;
        }
        if let Some(database) = lookup("FM_DATABASE") {
            self.remote.database = database;
        }
        if let Some(user) = lookup("FM_USER") {
            self.remote.user = user;
        }
        if let Some(password) = lookup("FM_PASSWORD") {
            self.remote.password = password;
        }
        if let Some(verify) = lookup("FM_VERIFY_SSL") {
            self.remote.verify_ssl = !verify.trim().eq_ignore_ascii_case("false");
        }
        if let Some(timeout) = lookup("FM_TIMEOUT").and_then(|v| v.trim().parse().ok()) {
            self.remote.timeout_ms = timeout;
        }

        if let Some(raw) = lookup("MCP_TRANSPORT") {
            match TransportKind::parse(&raw) {
                Some(kind) => self.server.transport = kind,
                None => tracing::warn!(transport = %raw, "Ignoring unknown MCP_TRANSPORT"),
            }
        }
        if let Some(port) = lookup("MCP_PORT").and_then(|v| v.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(host) = lookup("MCP_HOST") {
            self.server.host = host;
        }
        if let Some(flag) = lookup("MCP_LOG_FILE") {
            self.log_file = flag.trim().eq_ignore_ascii_case("true");
        }

        self
    }

    /// List configuration problems (empty when valid)
    ///
    /// The remote fields are only required once any of them is given, since named
    /// connections can be used without a baseline.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.remote.any_given() {
            if self.remote.server.is_empty() {
                errors.push("FM_SERVER is required".to_string());
            }
            if self.remote.database.is_empty() {
                errors.push("FM_DATABASE is required".to_string());
            }
            if self.remote.user.is_empty() {
                errors.push("FM_USER is required".to_string());
            }
        }

        if self.server.transport != TransportKind::Stdio
            && !(1..=65_535).contains(&self.server.port)
        {
            errors.push("MCP_PORT must be between 1 and 65535".to_string());
        }

        errors
    }
}
