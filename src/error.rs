//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout fmodata.
//! All errors are structured and map to stable error codes.
//!
//! # Error Categories
//! - `ConfigError`: Connection registry violations (duplicate name, missing name, empty field)
//! - `RemoteError`: Non-2xx answers from the OData service (structured or not)
//! - `TransportError`: Request sent but no response received (network failure, timeout)
//! - `ValidationError`: Malformed tool arguments or missing required parameters
//! - `NoActiveConnection`: A query tool was called before any connection was established
//! - `InvalidResponse`: The service answered 2xx with a body in an unexpected shape
//! - `RequestFailed`: The request could not be formed locally (bad URL, client setup)

use thiserror::Error;

/// Main error type for fmodata operations
#[derive(Error, Debug)]
pub enum FmodataError {
    /// Configuration or connection registry error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error reported by the OData service
    ///
    /// `code` is the OData error code when the body carried one, otherwise the HTTP status.
    #[error("OData error [{code}]: {message}")]
    RemoteError { code: String, message: String },

    /// No response received from the service
    #[error("No response from server - connection failed: {0}")]
    TransportError(String),

    /// Invalid input or missing required parameters
    #[error("Invalid input: {0}")]
    ValidationError(String),

    /// No client is selected for the session
    #[error(
        "No active connection. Please establish a connection first using set_connection or connect."
    )]
    NoActiveConnection,

    /// Successful response with an unusable body
    #[error("Unexpected response from server: {0}")]
    InvalidResponse(String),

    /// Local fault before a request was formed
    #[error("Request failed: {0}")]
    RequestFailed(String),
}

impl FmodataError {
    /// Convert error to error code string
    ///
    /// Error codes are stable and suitable for programmatic handling by agents.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::RemoteError { .. } => "REMOTE_ERROR",
            Self::TransportError(_) => "TRANSPORT_ERROR",
            Self::ValidationError(_) => "INVALID_INPUT",
            Self::NoActiveConnection => "NO_ACTIVE_CONNECTION",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
            Self::RequestFailed(_) => "REQUEST_FAILED",
        }
    }

    /// Get human-readable error message (agent-appropriate, no credentials)
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a remote service error
    pub fn remote_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteError { code: code.into(), message: message.into() }
    }

    /// Create a transport error
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::TransportError(message.into())
    }

    /// Create a validation error
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Create a request failed error
    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::RequestFailed(message.into())
    }
}

/// Result type alias for fmodata operations
pub type Result<T> = std::result::Result<T, FmodataError>;
