//! Error types for the in-unit bridge.

use harbor_capabilities::Capability;
use harbor_ipc::IpcError;
use thiserror::Error;

/// Errors surfaced to unit code.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The capability was not granted in `INIT`. Raised locally, without a
    /// round trip to the host.
    #[error("capability {0} not granted")]
    CapabilityDenied(Capability),

    /// The host refused a host-only message.
    #[error("direct API access blocked: {0}")]
    DirectApiBlocked(String),

    /// The host denied the intent.
    #[error("intent denied: {0}")]
    Denied(String),

    /// The intent was allowed but failed.
    #[error("intent failed: {0}")]
    Failed(String),

    /// No response arrived in time.
    #[error("{action} timed out after {timeout_ms}ms")]
    Timeout {
        /// Action that timed out.
        action: String,
        /// How long the bridge waited.
        timeout_ms: u64,
    },

    /// `INIT` has not been received yet.
    #[error("bridge is not initialized")]
    NotReady,

    /// The host is gone or sent `TERMINATE`.
    #[error("bridge closed")]
    Closed,

    /// Protocol error.
    #[error(transparent)]
    Ipc(#[from] IpcError),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
