//! Tagged error codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, machine-readable failure tag.
///
/// Every failure path of the host returns one of these plus an optional
/// human-readable reason. Codes are serialized in `SCREAMING_SNAKE_CASE`
/// so they appear on the wire exactly as named here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The manifest is structurally invalid. Never retried.
    InvalidManifest,
    /// An instance with the same app id is already live.
    AlreadyRunning,
    /// The execution unit could not be instantiated.
    SpawnFailed,
    /// Policy rejected a capability.
    CapabilityDenied,
    /// A message referenced an app id that is not registered.
    RuntimeNotFound,
    /// The instance crashed.
    RuntimeCrashed,
    /// A unit attempted to bypass the envelope protocol.
    DirectApiBlocked,
    /// An envelope failed structural validation.
    InvalidIpcMessage,
}

impl ErrorCode {
    /// Wire name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidManifest => "INVALID_MANIFEST",
            Self::AlreadyRunning => "ALREADY_RUNNING",
            Self::SpawnFailed => "SPAWN_FAILED",
            Self::CapabilityDenied => "CAPABILITY_DENIED",
            Self::RuntimeNotFound => "RUNTIME_NOT_FOUND",
            Self::RuntimeCrashed => "RUNTIME_CRASHED",
            Self::DirectApiBlocked => "DIRECT_API_BLOCKED",
            Self::InvalidIpcMessage => "INVALID_IPC_MESSAGE",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "INVALID_MANIFEST" => Self::InvalidManifest,
            "ALREADY_RUNNING" => Self::AlreadyRunning,
            "SPAWN_FAILED" => Self::SpawnFailed,
            "CAPABILITY_DENIED" => Self::CapabilityDenied,
            "RUNTIME_NOT_FOUND" => Self::RuntimeNotFound,
            "RUNTIME_CRASHED" => Self::RuntimeCrashed,
            "DIRECT_API_BLOCKED" => Self::DirectApiBlocked,
            "INVALID_IPC_MESSAGE" => Self::InvalidIpcMessage,
            _ => return None,
        })
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_matches_as_str() {
        for code in [
            ErrorCode::InvalidManifest,
            ErrorCode::AlreadyRunning,
            ErrorCode::SpawnFailed,
            ErrorCode::CapabilityDenied,
            ErrorCode::RuntimeNotFound,
            ErrorCode::RuntimeCrashed,
            ErrorCode::DirectApiBlocked,
            ErrorCode::InvalidIpcMessage,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
            assert_eq!(ErrorCode::from_wire(code.as_str()), Some(code));
        }
    }

    #[test]
    fn unknown_wire_name() {
        assert_eq!(ErrorCode::from_wire("NOPE"), None);
    }
}
