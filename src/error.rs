//! Error types for replywire
//!
//! Provides a unified error type for the fallible edges of the crate.
//! Reply builders themselves never return errors from `send_*` calls: sink
//! failures are captured in a sticky slot and surfaced via `error()`.

use thiserror::Error;

/// Result type alias using ReplyError
pub type Result<T> = std::result::Result<T, ReplyError>;

/// Unified error type for replywire operations
#[derive(Debug, Error)]
pub enum ReplyError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
