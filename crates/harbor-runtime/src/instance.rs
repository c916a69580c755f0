//! Registry entries.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use harbor_capabilities::{Capability, TrustLevel};
use harbor_core::{Pid, RuntimeState};

use crate::launcher::UnitChannel;
use crate::manifest::AppManifest;

/// A live or recently live application instance.
#[derive(Debug)]
pub struct RuntimeInstance {
    /// Application id, the registry key.
    pub app_id: String,
    /// Pid of this spawn.
    pub pid: Pid,
    /// Lifecycle state.
    pub state: RuntimeState,
    /// Manifest the instance was spawned from.
    pub manifest: AppManifest,
    /// Capabilities granted at spawn.
    pub granted_capabilities: BTreeSet<Capability>,
    /// Trust level the app id was classified as.
    pub trust_level: TrustLevel,
    /// Whether the spawn was requested by an administrator.
    pub is_admin: bool,
    /// When the instance was registered.
    pub started_at: DateTime<Utc>,
    /// Last heartbeat (or `RUNNING` transition).
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// How many times this app crashed, across spawns.
    pub crash_count: u32,
    /// When the instance was suspended, while suspended.
    pub suspended_at: Option<DateTime<Utc>>,
    /// When the instance was terminated.
    pub terminated_at: Option<DateTime<Utc>>,
    /// Last recorded error.
    pub error: Option<String>,
    pub(crate) channel: Option<UnitChannel>,
    // Monotonic twin of `last_heartbeat` for the watchdog.
    pub(crate) last_seen: Instant,
}

impl RuntimeInstance {
    pub(crate) fn new(
        manifest: AppManifest,
        pid: Pid,
        granted: BTreeSet<Capability>,
        channel: UnitChannel,
        trust_level: TrustLevel,
        is_admin: bool,
    ) -> Self {
        Self {
            app_id: manifest.app_id.clone(),
            pid,
            state: RuntimeState::Loading,
            manifest,
            granted_capabilities: granted,
            trust_level,
            is_admin,
            started_at: Utc::now(),
            last_heartbeat: None,
            crash_count: 0,
            suspended_at: None,
            terminated_at: None,
            error: None,
            channel: Some(channel),
            last_seen: Instant::now(),
        }
    }

    /// Whether the capability was granted.
    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.granted_capabilities.contains(&capability)
    }

    /// Whether the instance is still live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.state.is_terminal()
    }

    /// A serializable copy without the channel.
    #[must_use]
    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            app_id: self.app_id.clone(),
            pid: self.pid.clone(),
            state: self.state,
            name: self.manifest.name.clone(),
            version: self.manifest.version.clone(),
            granted_capabilities: self.granted_capabilities.iter().copied().collect(),
            trust_level: self.trust_level,
            is_admin: self.is_admin,
            started_at: self.started_at,
            last_heartbeat: self.last_heartbeat,
            crash_count: self.crash_count,
            suspended_at: self.suspended_at,
            terminated_at: self.terminated_at,
            error: self.error.clone(),
        }
    }
}

/// Point-in-time view of an instance, for ops surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct InstanceSnapshot {
    pub app_id: String,
    pub pid: Pid,
    pub state: RuntimeState,
    pub name: String,
    pub version: String,
    pub granted_capabilities: Vec<Capability>,
    pub trust_level: TrustLevel,
    pub is_admin: bool,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub crash_count: u32,
    pub suspended_at: Option<DateTime<Utc>>,
    pub terminated_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Instance counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStats {
    /// Instances in `LOADING`.
    pub loading: usize,
    /// Instances in `RUNNING`.
    pub running: usize,
    /// Instances in `SUSPENDED`.
    pub suspended: usize,
    /// Instances in `CRASHED`.
    pub crashed: usize,
    /// Instances in `TERMINATED`.
    pub terminated: usize,
    /// All registered instances.
    pub total: usize,
    /// Sum of crash counters.
    pub total_crashes: u64,
}

impl RuntimeStats {
    pub(crate) fn record(&mut self, instance: &RuntimeInstance) {
        let slot = match instance.state {
            RuntimeState::Loading => &mut self.loading,
            RuntimeState::Running => &mut self.running,
            RuntimeState::Suspended => &mut self.suspended,
            RuntimeState::Crashed => &mut self.crashed,
            RuntimeState::Terminated => &mut self.terminated,
        };
        *slot = slot.saturating_add(1);
        self.total = self.total.saturating_add(1);
        self.total_crashes = self
            .total_crashes
            .saturating_add(u64::from(instance.crash_count));
    }
}
