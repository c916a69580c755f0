//! Event types for the Harbor event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use harbor_capabilities::Capability;
use harbor_core::{Decision, Pid, RuntimeState};

/// Metadata attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Trace id of the logical operation, when the event belongs to one.
    pub trace_id: Option<String>,
    /// Source component that generated the event.
    pub source: String,
}

impl EventMetadata {
    /// Create new event metadata.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            trace_id: None,
            source: source.into(),
        }
    }

    /// Set the trace id.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// All events emitted by the runtime host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    // ========== Registry ==========
    /// An instance was added to the registry.
    InstanceRegistered {
        /// Event metadata.
        metadata: EventMetadata,
        /// Application id.
        app_id: String,
        /// Pid of the new spawn.
        pid: Pid,
        /// Capabilities granted to the instance.
        granted: Vec<Capability>,
    },

    /// An instance was removed from the registry.
    InstanceUnregistered {
        /// Event metadata.
        metadata: EventMetadata,
        /// Application id.
        app_id: String,
        /// Pid of the removed spawn.
        pid: Pid,
    },

    /// An instance changed lifecycle state.
    StateChanged {
        /// Event metadata.
        metadata: EventMetadata,
        /// Application id.
        app_id: String,
        /// Pid of the spawn.
        pid: Pid,
        /// Previous state.
        from: RuntimeState,
        /// New state.
        to: RuntimeState,
        /// Error recorded with the transition, if any.
        error: Option<String>,
        /// Crash counter after the transition.
        crash_count: u32,
    },

    /// A heartbeat was recorded.
    Heartbeat {
        /// Event metadata.
        metadata: EventMetadata,
        /// Application id.
        app_id: String,
        /// Pid of the spawn.
        pid: Pid,
    },

    /// The registry was emptied.
    RegistryCleared {
        /// Event metadata.
        metadata: EventMetadata,
        /// How many instances were removed.
        removed: usize,
    },

    // ========== Audit ==========
    /// A requested capability was refused at spawn time.
    CapabilityDenied {
        /// Event metadata.
        metadata: EventMetadata,
        /// Application id.
        app_id: String,
        /// Requested capability name.
        capability: String,
        /// Why it was refused.
        reason: String,
    },

    /// The host allowed or denied an intent.
    IntentDecision {
        /// Event metadata.
        metadata: EventMetadata,
        /// Application id.
        app_id: String,
        /// Intent action.
        action: String,
        /// Capability the intent declared.
        capability: String,
        /// The decision.
        decision: Decision,
    },

    /// A unit tried to bypass the envelope protocol.
    DirectApiBlocked {
        /// Event metadata.
        metadata: EventMetadata,
        /// Application id.
        app_id: String,
        /// The host-only message type the unit sent.
        message_type: String,
    },

    /// An envelope was dropped because it failed validation.
    InvalidMessage {
        /// Event metadata.
        metadata: EventMetadata,
        /// Channel the message arrived on.
        app_id: String,
        /// Validation failure.
        reason: String,
    },
}

impl RuntimeEvent {
    /// Get the event type as a string.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::InstanceRegistered { .. } => "instance_registered",
            Self::InstanceUnregistered { .. } => "instance_unregistered",
            Self::StateChanged { .. } => "state_changed",
            Self::Heartbeat { .. } => "heartbeat",
            Self::RegistryCleared { .. } => "registry_cleared",
            Self::CapabilityDenied { .. } => "capability_denied",
            Self::IntentDecision { .. } => "intent_decision",
            Self::DirectApiBlocked { .. } => "direct_api_blocked",
            Self::InvalidMessage { .. } => "invalid_message",
        }
    }

    /// Get the event metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::InstanceRegistered { metadata, .. }
            | Self::InstanceUnregistered { metadata, .. }
            | Self::StateChanged { metadata, .. }
            | Self::Heartbeat { metadata, .. }
            | Self::RegistryCleared { metadata, .. }
            | Self::CapabilityDenied { metadata, .. }
            | Self::IntentDecision { metadata, .. }
            | Self::DirectApiBlocked { metadata, .. }
            | Self::InvalidMessage { metadata, .. } => metadata,
        }
    }

    /// The application the event concerns, if any.
    #[must_use]
    pub fn app_id(&self) -> Option<&str> {
        match self {
            Self::InstanceRegistered { app_id, .. }
            | Self::InstanceUnregistered { app_id, .. }
            | Self::StateChanged { app_id, .. }
            | Self::Heartbeat { app_id, .. }
            | Self::CapabilityDenied { app_id, .. }
            | Self::IntentDecision { app_id, .. }
            | Self::DirectApiBlocked { app_id, .. }
            | Self::InvalidMessage { app_id, .. } => Some(app_id),
            Self::RegistryCleared { .. } => None,
        }
    }

    /// Whether the event belongs on the audit feed.
    #[must_use]
    pub fn is_audit(&self) -> bool {
        matches!(
            self,
            Self::CapabilityDenied { .. }
                | Self::IntentDecision { .. }
                | Self::DirectApiBlocked { .. }
        )
    }
}
