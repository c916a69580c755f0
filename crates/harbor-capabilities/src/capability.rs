//! The capability vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;

/// A named permission to perform one class of privileged operation.
///
/// The vocabulary is fixed at compile time; adding a capability is a
/// compile-checked change everywhere the enum is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// Read files inside the app's allowed paths.
    #[serde(rename = "fs.read")]
    FsRead,
    /// Write files inside the app's allowed paths.
    #[serde(rename = "fs.write")]
    FsWrite,
    /// Scratch key/value storage scoped to the app.
    #[serde(rename = "fs.temp")]
    TempStorage,
    /// Spawn a host process.
    #[serde(rename = "process.spawn")]
    SpawnProcess,
    /// Perform outbound network requests.
    #[serde(rename = "net.fetch")]
    NetworkFetch,
    /// Open a window in the shell.
    #[serde(rename = "ui.window")]
    OpenWindow,
    /// Post a user notification.
    #[serde(rename = "ui.notify")]
    Notify,
    /// Read the audit log.
    #[serde(rename = "audit.read")]
    ReadAudit,
}

impl Capability {
    /// Every capability in the vocabulary.
    pub const ALL: [Self; 8] = [
        Self::FsRead,
        Self::FsWrite,
        Self::TempStorage,
        Self::SpawnProcess,
        Self::NetworkFetch,
        Self::OpenWindow,
        Self::Notify,
        Self::ReadAudit,
    ];

    /// Wire name of the capability.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FsRead => "fs.read",
            Self::FsWrite => "fs.write",
            Self::TempStorage => "fs.temp",
            Self::SpawnProcess => "process.spawn",
            Self::NetworkFetch => "net.fetch",
            Self::OpenWindow => "ui.window",
            Self::Notify => "ui.notify",
            Self::ReadAudit => "audit.read",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|cap| cap.as_str() == s)
            .ok_or_else(|| CapabilityError::UnknownCapability(s.to_string()))
    }
}
