//! Runtime lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered execution unit.
///
/// ```text
/// LOADING ──► RUNNING ──► SUSPENDED ──► RUNNING
///    │           │            │
///    └───────────┴────────────┴──► CRASHED ──► TERMINATED
///                             └──────────────► TERMINATED
/// ```
///
/// `CRASHED` and `TERMINATED` are terminal for a registry entry: a crashed
/// unit is never revived in place, it must be unregistered and spawned
/// again. `CRASHED` may be re-entered (each re-entry counts as a crash) and
/// a crashed entry may still be moved to `TERMINATED` during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeState {
    /// Execution unit instantiated, `INIT` not yet acknowledged.
    Loading,
    /// Unit is live and processing messages.
    Running,
    /// Unit is paused by the host.
    Suspended,
    /// Unit reported or suffered a fault.
    Crashed,
    /// Unit was stopped by the host.
    Terminated,
}

impl RuntimeState {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Loading,
        Self::Running,
        Self::Suspended,
        Self::Crashed,
        Self::Terminated,
    ];

    /// Wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "LOADING",
            Self::Running => "RUNNING",
            Self::Suspended => "SUSPENDED",
            Self::Crashed => "CRASHED",
            Self::Terminated => "TERMINATED",
        }
    }

    /// Whether this state ends the life of the registry entry.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Crashed | Self::Terminated)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Loading => matches!(next, Self::Running | Self::Crashed | Self::Terminated),
            Self::Running => !matches!(next, Self::Loading),
            Self::Suspended => matches!(next, Self::Running | Self::Crashed | Self::Terminated),
            Self::Crashed => matches!(next, Self::Crashed | Self::Terminated),
            Self::Terminated => false,
        }
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_edges_are_allowed() {
        assert!(RuntimeState::Loading.can_transition_to(RuntimeState::Running));
        assert!(RuntimeState::Running.can_transition_to(RuntimeState::Suspended));
        assert!(RuntimeState::Running.can_transition_to(RuntimeState::Crashed));
        assert!(RuntimeState::Running.can_transition_to(RuntimeState::Terminated));
        assert!(RuntimeState::Suspended.can_transition_to(RuntimeState::Running));
    }

    #[test]
    fn unlisted_edges_are_refused() {
        assert!(!RuntimeState::Loading.can_transition_to(RuntimeState::Suspended));
        assert!(!RuntimeState::Loading.can_transition_to(RuntimeState::Loading));
        assert!(!RuntimeState::Suspended.can_transition_to(RuntimeState::Suspended));
        assert!(RuntimeState::Loading.can_transition_to(RuntimeState::Crashed));
        assert!(RuntimeState::Loading.can_transition_to(RuntimeState::Terminated));
        assert!(RuntimeState::Suspended.can_transition_to(RuntimeState::Crashed));
        assert!(RuntimeState::Suspended.can_transition_to(RuntimeState::Terminated));
    }

    #[test]
    fn running_to_running_is_idempotent() {
        assert!(RuntimeState::Running.can_transition_to(RuntimeState::Running));
    }

    #[test]
    fn crashed_is_never_revived() {
        assert!(!RuntimeState::Crashed.can_transition_to(RuntimeState::Running));
        assert!(!RuntimeState::Crashed.can_transition_to(RuntimeState::Suspended));
        assert!(RuntimeState::Crashed.can_transition_to(RuntimeState::Crashed));
        assert!(RuntimeState::Crashed.can_transition_to(RuntimeState::Terminated));
    }

    #[test]
    fn terminated_is_final() {
        for next in RuntimeState::ALL {
            assert!(!RuntimeState::Terminated.can_transition_to(next));
        }
    }

    #[test]
    fn nothing_returns_to_loading() {
        for from in RuntimeState::ALL {
            assert!(!from.can_transition_to(RuntimeState::Loading));
        }
    }

    #[test]
    fn wire_names() {
        assert_eq!(
            serde_json::to_string(&RuntimeState::Crashed).unwrap(),
            "\"CRASHED\""
        );
        assert_eq!(RuntimeState::Suspended.to_string(), "SUSPENDED");
    }
}
