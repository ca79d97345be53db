//! Error types for linetrace
//!
//! Errors are grouped by the stage that produced them so callers (and the
//! CLI's JSON output) can tell a bad script apart from a broken debugger
//! connection. Failing tests are never errors: they are trace data.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for linetrace
#[derive(Error, Debug)]
pub enum Error {
    // === Input Errors ===
    #[error("Failed to read script '{path}': {error}")]
    ScriptRead { path: String, error: String },

    #[error("{message} ({line}:{column})")]
    ScriptParse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Refusing to trace '{0}': it is reserved for linetrace's own test suite")]
    SelfInstrumentation(String),

    // === Spawn Errors ===
    #[error("Node.js executable '{0}' not found. Install Node.js or set [node].path in the config file")]
    NodeNotFound(String),

    #[error("Failed to start the test process: {0}")]
    SpawnFailed(String),

    // === Protocol Errors ===
    #[error("Failed to connect to the inspector at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Inspector protocol error: {0}")]
    Protocol(String),

    #[error("Inspector request '{method}' failed: {message}")]
    RequestFailed { method: String, message: String },

    #[error("Inspector connection closed")]
    Disconnected,

    // === Script Errors ===
    #[error("Script failed to parse while running: {0}")]
    UnrecoverableScript(String),

    // === Session Errors ===
    #[error("Cannot {action} while the session is {state}")]
    InvalidState { action: String, state: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The script could not be read, parsed or selected
    Input,
    /// The child process could not be launched
    Spawn,
    /// The inspector connection failed or misbehaved
    Protocol,
    /// The script stopped compiling once it was running
    UnrecoverableScript,
    /// Anything else (configuration, local IO, bugs)
    Internal,
}

impl Error {
    /// Create a request failed error
    pub fn request_failed(method: &str, message: &str) -> Self {
        Self::RequestFailed {
            method: method.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(action: &str, state: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Create a script read error
    pub fn script_read(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::ScriptRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ScriptRead { .. }
            | Error::ScriptParse { .. }
            | Error::InvalidPattern { .. }
            | Error::SelfInstrumentation(_) => ErrorKind::Input,
            Error::NodeNotFound(_) | Error::SpawnFailed(_) => ErrorKind::Spawn,
            Error::ConnectionFailed { .. }
            | Error::Protocol(_)
            | Error::RequestFailed { .. }
            | Error::Disconnected => ErrorKind::Protocol,
            Error::UnrecoverableScript(_) => ErrorKind::UnrecoverableScript,
            _ => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Error::ScriptRead { .. } => "SCRIPT_READ",
            Error::ScriptParse { .. } => "SCRIPT_PARSE",
            Error::InvalidPattern { .. } => "INVALID_PATTERN",
            Error::SelfInstrumentation(_) => "SELF_INSTRUMENTATION",
            Error::NodeNotFound(_) => "NODE_NOT_FOUND",
            Error::SpawnFailed(_) => "SPAWN_FAILED",
            Error::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Error::Protocol(_) => "PROTOCOL_ERROR",
            Error::RequestFailed { .. } => "REQUEST_FAILED",
            Error::Disconnected => "DISCONNECTED",
            Error::UnrecoverableScript(_) => "UNRECOVERABLE_SCRIPT",
            Error::InvalidState { .. } => "INVALID_STATE",
            Error::Config(_) | Error::ConfigParse(_) => "CONFIG_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Serializable error for the CLI's JSON output
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorReport {
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for ErrorReport {
    fn from(e: &Error) -> Self {
        Self {
            code: e.code().to_string(),
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message_carries_position() {
        let err = Error::ScriptParse {
            message: "Unexpected token".to_string(),
            line: 3,
            column: 7,
        };
        assert_eq!(err.to_string(), "Unexpected token (3:7)");
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_report_uses_code_and_kind() {
        let report = ErrorReport::from(&Error::Disconnected);
        assert_eq!(report.code, "DISCONNECTED");
        assert_eq!(report.kind, ErrorKind::Protocol);

        let report = ErrorReport::from(&Error::UnrecoverableScript("x".into()));
        assert_eq!(report.kind, ErrorKind::UnrecoverableScript);
    }
}
