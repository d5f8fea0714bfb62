//! WebSocket protocol messages
//!
//! One JSON text frame per message. Tool calls carry a flat argument map and
//! always answer with a `tool_result`, even when the operation failed.

use serde::{Deserialize, Serialize};

/// Messages sent from an orchestrator to the gateway
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {
        #[serde(default)]
        client_version: Option<String>,
    },
    /// Heartbeat ping
    Ping,
    /// Request the operation catalog
    ListTools,
    /// Invoke one operation
    CallTool {
        request_id: String,
        name: String,
        #[serde(default)]
        arguments: serde_json::Map<String, serde_json::Value>,
    },
}

/// Messages sent from the gateway to an orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        server_version: String,
        session_id: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Heartbeat pong
    Pong,
    Tools {
        tools: Vec<ToolDescriptor>,
    },
    ToolResult {
        request_id: String,
        name: String,
        output: ToolOutput,
    },
}

/// Catalog entry for `list_tools`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<String>,
}

/// Result value of an operation as it crosses the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Lines(Vec<String>),
    Json(serde_json::Value),
}

impl ToolOutput {
    /// Text form used by the CLI and by callers that expect a single string
    pub fn to_text(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Lines(lines) => lines.join("\n"),
            ToolOutput::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            ToolOutput::Text(text) => text.starts_with("ERROR:"),
            ToolOutput::Lines(lines) => lines.len() == 1 && lines[0].starts_with("ERROR:"),
            ToolOutput::Json(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileSystemError {
    #[error("access denied: '{attempted_path}' is outside the mounted root")]
    OutsideRoot { attempted_path: String },
    #[error("access denied: '{attempted_path}' is outside the sandbox limit")]
    OutsideSandbox { attempted_path: String },
    #[error("not found: '{path}'")]
    NotFound { path: String },
    #[error("not a directory: '{path}'")]
    NotADirectory { path: String },
    #[error("not a file: '{path}'")]
    NotAFile { path: String },
    #[error("'{path}' already exists")]
    AlreadyExists { path: String },
    #[error("{message}")]
    IoError { message: String },
}

impl FileSystemError {
    pub fn io(err: std::io::Error) -> Self {
        FileSystemError::IoError {
            message: err.to_string(),
        }
    }

    /// True for the two containment rejections
    pub fn is_boundary_violation(&self) -> bool {
        matches!(
            self,
            FileSystemError::OutsideRoot { .. } | FileSystemError::OutsideSandbox { .. }
        )
    }
}
