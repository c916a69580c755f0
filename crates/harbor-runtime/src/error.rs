//! Error types for the runtime host.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use harbor_core::ErrorCode;

use crate::validate::InvalidManifest;

/// Errors from loading manifests and instantiating units.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The manifest file could not be read.
    #[error("failed to read manifest at {path}: {source}")]
    ManifestRead {
        /// Path that was read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The manifest could not be parsed.
    #[error("failed to parse manifest at {path}: {message}")]
    ManifestParse {
        /// Path that was parsed, or `<inline>`.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The manifest is structurally invalid.
    #[error(transparent)]
    InvalidManifest(#[from] InvalidManifest),

    /// The unit could not be launched.
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised by a [`UnitLauncher`](crate::launcher::UnitLauncher).
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The launcher cannot run this kind of unit.
    #[error("unsupported runtime: {0}")]
    UnsupportedRuntime(String),

    /// The entry resolves outside the apps root.
    #[error("entry {entry} resolves outside {root}")]
    EntryOutsideRoot {
        /// Entry as written in the manifest.
        entry: String,
        /// Apps root it had to stay inside.
        root: PathBuf,
    },

    /// No in-process program is registered for the entry.
    #[error("no program registered for entry {0}")]
    ProgramNotFound(String),

    /// The OS refused to start the unit.
    #[error("failed to start unit: {0}")]
    Spawn(#[from] std::io::Error),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Failure of a host operation: a stable code and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {reason}")]
pub struct HostError {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable reason.
    pub reason: String,
}

impl HostError {
    /// Create a host error.
    #[must_use]
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl From<InvalidManifest> for HostError {
    fn from(err: InvalidManifest) -> Self {
        Self::new(ErrorCode::InvalidManifest, err.to_string())
    }
}
