//! IPC error types.

use thiserror::Error;

/// Errors raised by the envelope protocol.
#[derive(Debug, Error)]
pub enum IpcError {
    /// The message is not a well-formed envelope.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The `type` field names no known message type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The intent could not be parsed into a known action.
    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    /// No response arrived within the timeout.
    #[error("request {request_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// The request that timed out.
        request_id: String,
        /// How long the waiter waited.
        timeout_ms: u64,
    },

    /// The request was cancelled before a response arrived.
    #[error("request {0} was cancelled")]
    Cancelled(String),

    /// The other end of the channel is gone.
    #[error("channel closed")]
    ChannelClosed,

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IpcError {
    /// Whether the error describes a malformed message (as opposed to a
    /// transport or timing failure).
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidMessage(_)
                | Self::UnknownMessageType(_)
                | Self::InvalidIntent(_)
                | Self::Serialization(_)
        )
    }
}

/// Result type for IPC operations.
pub type IpcResult<T> = Result<T, IpcError>;
