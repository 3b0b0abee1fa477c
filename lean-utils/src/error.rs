//! Error types for lean-client
//!
//! Provides a unified error type used across all lean-client crates.

use std::path::PathBuf;

use lean_protocol::{CodecError, DecodeError};

/// Main error type for lean-client operations
#[derive(Debug, thiserror::Error)]
pub enum LeanError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Session Errors ===

    #[error("No Lean server is running")]
    NoServer,

    #[error("Lean server already started")]
    AlreadyStarted,

    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    #[error("Connection to the Lean server closed")]
    ConnectionClosed,

    // === Protocol Errors ===

    #[error("Lean server error for '{command}': {message}")]
    Server { command: String, message: String },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Response for unknown sequence number {seq_num}")]
    Desync { seq_num: u64 },

    #[error("Unexpected '{got}' response to '{command}'")]
    UnexpectedResponse {
        command: &'static str,
        got: &'static str,
    },

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LeanError {
    /// Create a server error for a command
    pub fn server(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Server {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error means the stream can no longer be trusted
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Protocol(_) | Self::Desync { .. }
        )
    }
}

impl From<CodecError> for LeanError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => Self::Io(e),
            CodecError::Decode(e) => Self::Decode(e),
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// Result type alias using LeanError
pub type Result<T> = std::result::Result<T, LeanError>;
