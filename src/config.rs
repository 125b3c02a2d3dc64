//! Process-wide server configuration.
//!
//! Host, port and message delimiter are read once at startup and stay fixed
//! for the lifetime of the process.

use serde::{Deserialize, Serialize};

use crate::error::HooklineError;

/// Address the test runner connects to by default.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port the test runner connects to by default.
pub const DEFAULT_PORT: u16 = 61321;

/// Separator written after every message, in both directions.
pub const DEFAULT_DELIMITER: &str = "\n";

/// Upper bound for a single framed message (64 MiB).
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Configuration for the hook server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to listen on
    pub host: String,
    /// TCP port to listen on (0 picks an ephemeral port)
    pub port: u16,
    /// Message delimiter, must be non-empty
    pub delimiter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string used for binding and log lines.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject configurations the server cannot frame messages with.
    pub fn validate(&self) -> Result<(), HooklineError> {
        if self.delimiter.is_empty() {
            return Err(HooklineError::Config(
                "message delimiter must not be empty".to_string(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(HooklineError::Config("host must not be empty".to_string()));
        }
        Ok(())
    }
}
