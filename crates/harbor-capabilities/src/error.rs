//! Capability error types.

use thiserror::Error;

/// Errors that can occur when working with capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// The name is not part of the capability vocabulary.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),
}

/// Result type for capability operations.
pub type CapabilityResult<T> = Result<T, CapabilityError>;
