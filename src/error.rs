//! Error types for looprun
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in looprun
#[derive(Debug, Error)]
pub enum LooprunError {
    /// Another primary process holds the workspace lock
    #[error("Lock contention: {0}")]
    LockContention(String),

    /// Invalid completion criteria or configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The iteration executor failed (recoverable, counts toward failures)
    #[error("Executor failure: {0}")]
    Executor(String),

    /// Unrecoverable system-level error (immediately terminal)
    #[error("System error: {0}")]
    System(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for looprun operations
pub type Result<T> = std::result::Result<T, LooprunError>;
