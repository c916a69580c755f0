//! Runtime registry.
//!
//! The authoritative table of application instances, keyed by app id.
//! Every successful mutation publishes a [`RuntimeEvent`] on the registry's
//! [`EventBus`] after the table has been updated.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use harbor_capabilities::{Capability, TrustLevel};
use harbor_core::{Pid, RuntimeState};
use harbor_events::{
    EventBus, EventMetadata, EventReceiver, EventSubscriber, RuntimeEvent, SubscriberId,
};
use harbor_ipc::Envelope;

use crate::instance::{RuntimeInstance, RuntimeStats};
use crate::launcher::UnitChannel;
use crate::manifest::AppManifest;

const EVENT_SOURCE: &str = "registry";

/// Table of application instances.
#[derive(Debug)]
pub struct RuntimeRegistry {
    instances: HashMap<String, RuntimeInstance>,
    events: EventBus,
}

impl RuntimeRegistry {
    /// Create an empty registry publishing on `events`.
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            instances: HashMap::new(),
            events,
        }
    }

    /// Insert an instance in `LOADING`.
    ///
    /// The host guarantees the app id is not live. If it is anyway, the old
    /// instance's unit is disposed and the entry replaced. A terminal entry
    /// for the same app hands its crash counter to the new instance.
    pub fn register(
        &mut self,
        manifest: AppManifest,
        pid: Pid,
        granted: BTreeSet<Capability>,
        channel: UnitChannel,
        trust_level: TrustLevel,
        is_admin: bool,
    ) -> &RuntimeInstance {
        let app_id = manifest.app_id.clone();
        let mut instance =
            RuntimeInstance::new(manifest, pid, granted, channel, trust_level, is_admin);

        if let Some(mut previous) = self.instances.remove(&app_id) {
            if previous.is_live() {
                error!(
                    app_id = %app_id,
                    old_pid = %previous.pid,
                    new_pid = %instance.pid,
                    "Registering over a live instance, replacing it"
                );
            }
            teardown(&mut previous);
            instance.crash_count = previous.crash_count;
        }

        info!(
            app_id = %app_id,
            pid = %instance.pid,
            trust_level = %trust_level,
            granted = instance.granted_capabilities.len(),
            "Registered instance"
        );

        let event = RuntimeEvent::InstanceRegistered {
            metadata: EventMetadata::new(EVENT_SOURCE),
            app_id: app_id.clone(),
            pid: instance.pid.clone(),
            granted: instance.granted_capabilities.iter().copied().collect(),
        };

        self.instances.insert(app_id.clone(), instance);
        self.events.publish(event);

        &self.instances[&app_id]
    }

    /// Remove an instance, disposing its unit. Returns `false` if the app id
    /// is unknown.
    pub fn unregister(&mut self, app_id: &str) -> bool {
        let Some(mut instance) = self.instances.remove(app_id) else {
            debug!(app_id, "Unregister of unknown instance");
            return false;
        };

        teardown(&mut instance);
        info!(app_id, pid = %instance.pid, "Unregistered instance");

        self.events.publish(RuntimeEvent::InstanceUnregistered {
            metadata: EventMetadata::new(EVENT_SOURCE),
            app_id: app_id.to_string(),
            pid: instance.pid,
        });
        true
    }

    /// Move an instance to `state`, recording `error` when given.
    ///
    /// Returns `false` for an unknown app id or a transition the lifecycle
    /// does not allow. The unit stays attached until [`Self::unregister`]
    /// or [`Self::clear`].
    pub fn update_state(
        &mut self,
        app_id: &str,
        state: RuntimeState,
        error: Option<String>,
    ) -> bool {
        let Some(instance) = self.instances.get_mut(app_id) else {
            debug!(app_id, %state, "State update for unknown instance");
            return false;
        };

        let from = instance.state;
        if !from.can_transition_to(state) {
            warn!(app_id, %from, to = %state, "Illegal state transition ignored");
            return false;
        }

        let now = Utc::now();
        match state {
            RuntimeState::Running => {
                if from == RuntimeState::Running {
                    trace!(app_id, "Already running");
                }
                instance.last_heartbeat = Some(now);
                instance.last_seen = Instant::now();
                instance.suspended_at = None;
            },
            RuntimeState::Suspended => instance.suspended_at = Some(now),
            RuntimeState::Crashed => {
                instance.crash_count = instance.crash_count.saturating_add(1);
            },
            RuntimeState::Terminated => instance.terminated_at = Some(now),
            RuntimeState::Loading => {},
        }
        if error.is_some() {
            instance.error.clone_from(&error);
        }
        instance.state = state;

        match state {
            RuntimeState::Crashed => error!(
                app_id,
                pid = %instance.pid,
                crash_count = instance.crash_count,
                error = error.as_deref().unwrap_or("unknown"),
                "Instance crashed"
            ),
            _ if from != state => info!(
                app_id,
                pid = %instance.pid,
                %from,
                to = %state,
                "Instance state changed"
            ),
            _ => {},
        }

        let event = RuntimeEvent::StateChanged {
            metadata: EventMetadata::new(EVENT_SOURCE),
            app_id: app_id.to_string(),
            pid: instance.pid.clone(),
            from,
            to: state,
            error,
            crash_count: instance.crash_count,
        };
        self.events.publish(event);
        true
    }

    /// Record a heartbeat. Returns `false` for unknown or terminal
    /// instances.
    pub fn update_heartbeat(&mut self, app_id: &str) -> bool {
        let Some(instance) = self.instances.get_mut(app_id) else {
            return false;
        };
        if !instance.is_live() {
            return false;
        }

        instance.last_heartbeat = Some(Utc::now());
        instance.last_seen = Instant::now();
        trace!(app_id, "Heartbeat");

        let event = RuntimeEvent::Heartbeat {
            metadata: EventMetadata::new(EVENT_SOURCE),
            app_id: app_id.to_string(),
            pid: instance.pid.clone(),
        };
        self.events.publish(event);
        true
    }

    /// Dispose every unit and empty the table. Returns how many instances
    /// were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.instances.len();
        for (_, mut instance) in self.instances.drain() {
            teardown(&mut instance);
        }

        info!(removed, "Cleared registry");
        self.events.publish(RuntimeEvent::RegistryCleared {
            metadata: EventMetadata::new(EVENT_SOURCE),
            removed,
        });
        removed
    }

    /// Look up an instance by app id.
    #[must_use]
    pub fn get(&self, app_id: &str) -> Option<&RuntimeInstance> {
        self.instances.get(app_id)
    }

    /// Look up an instance by pid.
    #[must_use]
    pub fn get_by_pid(&self, pid: &Pid) -> Option<&RuntimeInstance> {
        self.instances.values().find(|instance| &instance.pid == pid)
    }

    /// All instances, ordered by app id.
    #[must_use]
    pub fn get_all(&self) -> Vec<&RuntimeInstance> {
        let mut all: Vec<&RuntimeInstance> = self.instances.values().collect();
        all.sort_by(|a, b| a.app_id.cmp(&b.app_id));
        all
    }

    /// Instances in `RUNNING`, ordered by app id.
    #[must_use]
    pub fn get_running(&self) -> Vec<&RuntimeInstance> {
        self.get_all()
            .into_iter()
            .filter(|instance| instance.state == RuntimeState::Running)
            .collect()
    }

    /// Whether the app is registered and not terminal.
    #[must_use]
    pub fn is_running(&self, app_id: &str) -> bool {
        self.instances
            .get(app_id)
            .is_some_and(RuntimeInstance::is_live)
    }

    /// Whether the app holds `capability`.
    #[must_use]
    pub fn has_capability(&self, app_id: &str, capability: Capability) -> bool {
        self.instances
            .get(app_id)
            .is_some_and(|instance| instance.has_capability(capability))
    }

    /// Counts by state.
    #[must_use]
    pub fn stats(&self) -> RuntimeStats {
        let mut stats = RuntimeStats::default();
        for instance in self.instances.values() {
            stats.record(instance);
        }
        stats
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// A sender to the app's unit, if it has one.
    #[must_use]
    pub fn sender(&self, app_id: &str) -> Option<mpsc::Sender<Envelope>> {
        self.instances
            .get(app_id)?
            .channel
            .as_ref()
            .map(|channel| channel.sender.clone())
    }

    /// Receive change notifications asynchronously.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Register a synchronous change subscriber. It runs inline after each
    /// mutation, while the caller still holds the registry.
    pub fn on_change(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriberId {
        self.events.register(subscriber)
    }

    /// The bus this registry publishes on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn live_since(&self) -> impl Iterator<Item = (&str, Instant)> {
        self.instances
            .values()
            .filter(|instance| instance.state == RuntimeState::Running)
            .map(|instance| (instance.app_id.as_str(), instance.last_seen))
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::new(EventBus::new())
    }
}

// Dispose errors are logged, never propagated.
fn teardown(instance: &mut RuntimeInstance) {
    if let Some(mut channel) = instance.channel.take()
        && let Err(e) = channel.dispose()
    {
        warn!(
            app_id = %instance.app_id,
            pid = %instance.pid,
            error = %e,
            "Failed to dispose unit"
        );
    }
}
