//! Error types for the dummy neighbor
//!
//! This module contains all error types used by the neighbor crates: transport
//! failures seen while calling the peer, wire framing failures, configuration
//! errors raised before anything is started, and the `NeighborError` type that
//! unifies them.

use crate::protocol::Method;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures of a single call over the transport
///
/// All of these are soft errors from the point of view of a request loop: the
/// attempt is logged and counted, and the loop proceeds to its next tick.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },
    #[error("Network I/O error: {0}")]
    NetworkIo(#[from] std::io::Error),
    #[error("Call timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("Method {method} is not served by the peer")]
    Unimplemented { method: Method },
    #[error("Peer closed the {method} call without replying")]
    ReplyWithheld { method: Method },
    #[error("Unexpected reply: expected {expected}, got {actual}")]
    UnexpectedReply { expected: String, actual: String },
    #[error("Framing error: {0}")]
    Wire(#[from] WireError),
    #[error("Malformed {method} call: {reason}")]
    MalformedCall { method: Method, reason: String },
}

/// Failures while encoding or decoding frames
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("Frame body encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("Frame too large (max {max}, got {actual})")]
    FrameTooLarge { max: usize, actual: usize },
    #[error("Truncated frame (expected {expected} bytes, got {actual})")]
    Truncated { expected: usize, actual: usize },
}

/// Startup-time configuration problems
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown scenario: {id}")]
    UnknownScenario { id: String },
    #[error("Malformed scenario identifier: {id}")]
    MalformedScenario { id: String },
    #[error("Configuration validation error: {0}")]
    Validation(String),
}

// ----------------------------------------------------------------------------
// Top-level Error
// ----------------------------------------------------------------------------

/// Core error type for the dummy neighbor
#[derive(Debug, thiserror::Error)]
pub enum NeighborError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The listening endpoint could not be bound
    #[error("Failed to bind {address}: {reason}")]
    Bind { address: String, reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl NeighborError {
    /// Create a validation error with a message
    pub fn validation<T: Into<String>>(message: T) -> Self {
        NeighborError::Config(ConfigError::Validation(message.into()))
    }

    /// Whether this error was raised before anything was started
    pub fn is_configuration(&self) -> bool {
        matches!(self, NeighborError::Config(_))
    }
}

impl From<std::io::Error> for NeighborError {
    fn from(err: std::io::Error) -> Self {
        NeighborError::Transport(TransportError::NetworkIo(err))
    }
}

impl From<bincode::Error> for NeighborError {
    fn from(err: bincode::Error) -> Self {
        NeighborError::Wire(WireError::Encoding(err))
    }
}

/// Result type for neighbor operations
pub type NeighborResult<T> = core::result::Result<T, NeighborError>;
