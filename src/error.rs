//! Error types for startup and per-connection failures.

use std::path::PathBuf;

/// Startup-phase errors. Any of these aborts `run` before serving begins.
#[derive(Debug, thiserror::Error)]
pub enum HooklineError {
    #[error("Failed to bind hook server to {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load hook file {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("Invalid hook file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("No hook files were loaded")]
    NoHookFiles,

    #[error("Invalid server configuration: {0}")]
    Config(String),
}

/// Errors that end a single connection. The server keeps accepting after these.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Connection I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Message is not a valid envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected payload for event '{event}': {reason}")]
    Shape { event: String, reason: String },

    #[error("Message too large: {0} bytes")]
    TooLarge(usize),
}
