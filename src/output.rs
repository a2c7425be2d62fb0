//! Tool Result Envelope
//!
//! Every tool call returns the same shape, success or failure:
//!
//! - Success: `{"content": [{"type": "text", "text": "..."}], "isError": false}`
//! - Error: `{"content": [{"type": "text", "text": "Error: ..."}], "isError": true}`
//!
//! Text never contains a password.

use serde::{Deserialize, Serialize};

use crate::error::FmodataError;

/// A text content block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    /// Always `"text"`
    #[serde(rename = "type")]
    pub content_type: String,

    pub text: String,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { content_type: "text".to_string(), text: text.into() }
    }
}

/// Result of a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<TextContent>,

    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    /// Successful result with one text block
    pub fn success(text: impl Into<String>) -> Self {
        Self { content: vec![TextContent::new(text)], is_error: false }
    }

    /// Error result; the text is prefixed with `Error: `
    pub fn error(message: impl AsRef<str>) -> Self {
        Self { content: vec![TextContent::new(format!("Error: {}", message.as_ref()))], is_error: true }
    }

    pub fn from_error(err: &FmodataError) -> Self {
        Self::error(err.message())
    }

    /// Text of all content blocks, joined by newlines
    pub fn text(&self) -> String {
        self.content.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n")
    }
}
