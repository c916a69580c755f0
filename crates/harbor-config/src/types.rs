//! Configuration struct definitions.
//!
//! Every struct implements [`Default`] with the values from the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the Harbor runtime host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Runtime host timing and limits.
    pub host: HostSection,
    /// Trust classification.
    pub trust: TrustSection,
    /// Logging level and format.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// HostSection
// ---------------------------------------------------------------------------

/// Runtime host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSection {
    /// How long a unit waits for an intent response.
    pub intent_timeout_ms: u64,
    /// How often units heartbeat.
    pub heartbeat_interval_ms: u64,
    /// How long instantiating a unit may take before the spawn fails.
    pub spawn_timeout_ms: u64,
    /// A running instance whose last heartbeat is older than this is marked
    /// crashed. Unset disables the watchdog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_grace_ms: Option<u64>,
    /// How often the watchdog checks heartbeats.
    pub watchdog_interval_ms: u64,
    /// Capacity of each unit channel and of the host inbox.
    pub channel_capacity: usize,
    /// Directory holding installed applications. Process units run with it
    /// as their working directory.
    pub apps_root: PathBuf,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            intent_timeout_ms: 30_000,
            heartbeat_interval_ms: 10_000,
            spawn_timeout_ms: 10_000,
            heartbeat_grace_ms: None,
            watchdog_interval_ms: 1_000,
            channel_capacity: 64,
            apps_root: PathBuf::from("/apps"),
        }
    }
}

impl HostSection {
    /// Intent timeout as a duration.
    #[must_use]
    pub fn intent_timeout(&self) -> Duration {
        Duration::from_millis(self.intent_timeout_ms)
    }

    /// Heartbeat interval as a duration.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Spawn timeout as a duration.
    #[must_use]
    pub fn spawn_timeout(&self) -> Duration {
        Duration::from_millis(self.spawn_timeout_ms)
    }

    /// Heartbeat grace period, if the watchdog is enabled.
    #[must_use]
    pub fn heartbeat_grace(&self) -> Option<Duration> {
        self.heartbeat_grace_ms.map(Duration::from_millis)
    }

    /// Watchdog tick as a duration.
    #[must_use]
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// TrustSection
// ---------------------------------------------------------------------------

/// Trust classification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustSection {
    /// App id prefixes reserved for first-party applications.
    pub first_party_prefixes: Vec<String>,
}

impl Default for TrustSection {
    fn default() -> Self {
        Self {
            first_party_prefixes: vec!["core.".to_owned()],
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Whether to use ANSI colors on terminal output.
    pub ansi: bool,
    /// Write rotated log files here instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Per-crate tracing directives (e.g. `["harbor_runtime=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            ansi: true,
            directory: None,
            directives: Vec::new(),
        }
    }
}
