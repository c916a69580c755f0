//! The runtime host.
//!
//! [`RuntimeHost`] spawns units, owns the registry and runs the host loop
//! that every unit message flows through. Spawn and terminate mutate the
//! registry directly under its lock; everything a unit says is applied by
//! the loop, one message at a time.

mod limiter;
mod router;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use harbor_capabilities::{Capability, DenialReason, PolicyTable, TrustClassifier, grant};
use harbor_core::{ErrorCode, Pid, PidAllocator, RuntimeState};
use harbor_events::{EventBus, EventMetadata, RuntimeEvent};
use harbor_ipc::{ChannelEvent, Envelope, InitPayload};
use harbor_telemetry::RequestContext;

use crate::dispatcher::IntentDispatcher;
use crate::error::HostError;
use crate::instance::{InstanceSnapshot, RuntimeStats};
use crate::launcher::{LaunchSpec, LaunchedUnit, UnitLauncher};
use crate::manifest::AppManifest;
use crate::registry::RuntimeRegistry;
use crate::validate::validate_manifest;

use limiter::RateLimiter;
use router::{Inbound, Router};

/// Timing, limits and policy of a host.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// How long units wait for an intent response. Sent in `INIT`.
    pub intent_timeout: Duration,
    /// How often units heartbeat. Sent in `INIT`.
    pub heartbeat_interval: Duration,
    /// How long instantiating a unit may take.
    pub spawn_timeout: Duration,
    /// Running instances silent for longer than this are marked crashed.
    /// `None` disables the watchdog.
    pub heartbeat_grace: Option<Duration>,
    /// How often the watchdog looks.
    pub watchdog_interval: Duration,
    /// Capacity of unit channels and of the host inbox.
    pub channel_capacity: usize,
    /// Trust classification of app ids.
    pub trust: TrustClassifier,
    /// Capability policies.
    pub policies: PolicyTable,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            intent_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(10),
            spawn_timeout: Duration::from_secs(10),
            heartbeat_grace: None,
            watchdog_interval: Duration::from_secs(1),
            channel_capacity: 64,
            trust: TrustClassifier::default(),
            policies: PolicyTable::builtin(),
        }
    }
}

impl HostOptions {
    /// Replace the policy table.
    #[must_use]
    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = policies;
        self
    }

    /// Replace the trust classifier.
    #[must_use]
    pub fn with_trust(mut self, trust: TrustClassifier) -> Self {
        self.trust = trust;
        self
    }

    /// Set the spawn timeout.
    #[must_use]
    pub fn with_spawn_timeout(mut self, timeout: Duration) -> Self {
        self.spawn_timeout = timeout;
        self
    }

    /// Set the heartbeat interval handed to units.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Enable the heartbeat watchdog.
    #[must_use]
    pub fn with_heartbeat_grace(mut self, grace: Duration) -> Self {
        self.heartbeat_grace = Some(grace);
        self
    }
}

/// A successful spawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnSuccess {
    /// Application id.
    pub app_id: String,
    /// Pid of the new spawn.
    pub pid: Pid,
    /// Capabilities granted.
    pub granted: Vec<Capability>,
    /// Requested capabilities that were refused, with the reason.
    pub denied: BTreeMap<String, DenialReason>,
}

/// Outcome of [`RuntimeHost::spawn`].
pub type SpawnResult = Result<SpawnSuccess, HostError>;

pub(crate) struct HostShared {
    pub(crate) registry: Arc<RwLock<RuntimeRegistry>>,
    pub(crate) options: HostOptions,
    pub(crate) dispatcher: Arc<dyn IntentDispatcher>,
    pub(crate) events: EventBus,
    pub(crate) limiter: RateLimiter,
}

/// Spawns, supervises and terminates application instances.
///
/// Must be started inside a tokio runtime. Dropping the host stops its
/// loop; units are torn down by [`RuntimeHost::shutdown`].
pub struct RuntimeHost {
    shared: Arc<HostShared>,
    launcher: Arc<dyn UnitLauncher>,
    pids: PidAllocator,
    inbox: mpsc::Sender<Inbound>,
    spawning: DashSet<String>,
    router: JoinHandle<()>,
}

impl RuntimeHost {
    /// Start a host and its loop.
    #[must_use]
    pub fn start(
        options: HostOptions,
        launcher: Arc<dyn UnitLauncher>,
        dispatcher: Arc<dyn IntentDispatcher>,
        events: EventBus,
    ) -> Self {
        let (inbox, inbox_rx) = mpsc::channel(options.channel_capacity.max(1));
        let shared = Arc::new(HostShared {
            registry: Arc::new(RwLock::new(RuntimeRegistry::new(events.clone()))),
            options,
            dispatcher,
            events,
            limiter: RateLimiter::new(),
        });
        let router = tokio::spawn(Router::new(Arc::clone(&shared)).run(inbox_rx));

        info!(
            policies = shared.options.policies.len(),
            watchdog = shared.options.heartbeat_grace.is_some(),
            "Runtime host started"
        );

        Self {
            shared,
            launcher,
            pids: PidAllocator::new(),
            inbox,
            spawning: DashSet::new(),
            router,
        }
    }

    /// Spawn an instance of `manifest`.
    ///
    /// Validates the manifest, refuses an app id that is already live,
    /// grants capabilities, launches the unit, registers it, sends `INIT`
    /// and marks it running.
    ///
    /// # Errors
    ///
    /// `INVALID_MANIFEST`, `ALREADY_RUNNING`, `SPAWN_FAILED` (unsupported
    /// runtime, launch failure or timeout) or `RUNTIME_CRASHED` when the
    /// unit dies before it is running.
    pub async fn spawn(&self, manifest: AppManifest, is_admin: bool) -> SpawnResult {
        let ctx = RequestContext::new("host")
            .with_app_id(manifest.app_id.clone())
            .with_operation("spawn");
        let span = ctx.span();
        self.spawn_traced(manifest, is_admin, &ctx)
            .instrument(span)
            .await
    }

    async fn spawn_traced(
        &self,
        manifest: AppManifest,
        is_admin: bool,
        ctx: &RequestContext,
    ) -> SpawnResult {
        if let Err(e) = validate_manifest(&manifest) {
            warn!(reason = %e, "Rejected manifest");
            return Err(e.into());
        }

        let app_id = manifest.app_id.clone();
        let Some(_guard) = SpawnGuard::acquire(&self.spawning, &app_id) else {
            return Err(already_running(&app_id));
        };
        if self.shared.registry.read().await.is_running(&app_id) {
            return Err(already_running(&app_id));
        }

        let options = &self.shared.options;
        let trust = options.trust.classify(&app_id);
        let outcome = grant(
            &options.policies,
            manifest.requested_capabilities.as_slice(),
            trust,
            is_admin,
        );
        for (capability, reason) in &outcome.denied {
            self.shared.events.publish(RuntimeEvent::CapabilityDenied {
                metadata: EventMetadata::new("host").with_trace_id(ctx.trace_id.clone()),
                app_id: app_id.clone(),
                capability: capability.clone(),
                reason: reason.to_string(),
            });
        }
        if !outcome.denied.is_empty() {
            info!(
                %trust,
                denied = outcome.denied.len(),
                "Some requested capabilities were denied"
            );
        }

        if !manifest.runtime.is_spawnable() || !self.launcher.supports(&manifest.runtime) {
            return Err(HostError::new(
                ErrorCode::SpawnFailed,
                format!("runtime '{}' cannot be spawned", manifest.runtime),
            ));
        }

        let pid = self.pids.next_pid();
        let spec = LaunchSpec {
            app_id: app_id.clone(),
            pid: pid.clone(),
            manifest,
            granted: outcome.granted.clone(),
            channel_capacity: options.channel_capacity,
        };

        let launched =
            match tokio::time::timeout(options.spawn_timeout, self.launcher.launch(&spec)).await {
                Ok(Ok(launched)) => launched,
                Ok(Err(e)) => {
                    error!(%pid, error = %e, "Failed to launch unit");
                    return Err(HostError::new(ErrorCode::SpawnFailed, e.to_string()));
                },
                Err(_) => {
                    error!(%pid, timeout_ms = millis(options.spawn_timeout), "Unit launch timed out");
                    return Err(HostError::new(
                        ErrorCode::SpawnFailed,
                        format!(
                            "unit did not start within {}ms",
                            millis(options.spawn_timeout)
                        ),
                    ));
                },
            };

        let LaunchedUnit { channel, events } = launched;
        let sender = channel.sender.clone();
        self.shared.registry.write().await.register(
            spec.manifest,
            pid.clone(),
            spec.granted,
            channel,
            trust,
            is_admin,
        );
        self.attach(app_id.clone(), pid.clone(), events);

        let init = Envelope::init(
            &app_id,
            &InitPayload {
                capabilities: outcome.granted_list(),
                heartbeat_interval_ms: millis(options.heartbeat_interval),
                intent_timeout_ms: millis(options.intent_timeout),
            },
        );
        if sender.send(init).await.is_err() {
            let reason = "unit closed its channel before INIT";
            self.shared.registry.write().await.update_state(
                &app_id,
                RuntimeState::Crashed,
                Some(reason.to_string()),
            );
            return Err(HostError::new(ErrorCode::SpawnFailed, reason));
        }

        let mut registry = self.shared.registry.write().await;
        if !registry.update_state(&app_id, RuntimeState::Running, None) {
            let reason = registry
                .get(&app_id)
                .and_then(|instance| instance.error.clone())
                .unwrap_or_else(|| "unit stopped during startup".to_string());
            return Err(HostError::new(ErrorCode::RuntimeCrashed, reason));
        }
        drop(registry);

        info!(
            %pid,
            granted = outcome.granted.len(),
            elapsed_ms = ctx.elapsed_ms(),
            "Spawned instance"
        );

        Ok(SpawnSuccess {
            app_id,
            pid,
            granted: outcome.granted_list(),
            denied: outcome.denied,
        })
    }

    // Tags everything the unit says with its spawn and feeds the host loop.
    fn attach(&self, app_id: String, pid: Pid, mut events: mpsc::Receiver<ChannelEvent>) {
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let inbound = Inbound {
                    app_id: app_id.clone(),
                    pid: pid.clone(),
                    event: Some(event),
                };
                if inbox.send(inbound).await.is_err() {
                    return;
                }
            }
            let _ = inbox
                .send(Inbound {
                    app_id,
                    pid,
                    event: None,
                })
                .await;
        });
    }

    /// Terminate an instance: send a best-effort `TERMINATE`, mark it
    /// terminated and remove it. Returns `false` if the app is not
    /// registered.
    pub async fn terminate(&self, app_id: &str) -> bool {
        let mut registry = self.shared.registry.write().await;
        let Some(pid) = registry.get(app_id).map(|instance| instance.pid.clone()) else {
            debug!(app_id, "Terminate of unknown instance");
            return false;
        };

        if let Some(sender) = registry.sender(app_id)
            && let Err(e) = sender.try_send(Envelope::terminate(app_id))
        {
            debug!(app_id, error = %e, "Could not deliver TERMINATE");
        }
        registry.update_state(app_id, RuntimeState::Terminated, None);
        registry.unregister(app_id);
        drop(registry);

        self.shared.limiter.forget(app_id);
        info!(app_id, %pid, "Terminated instance");
        true
    }

    /// Suspend a running instance.
    pub async fn suspend(&self, app_id: &str) -> bool {
        let mut registry = self.shared.registry.write().await;
        match registry.get(app_id).map(|instance| instance.state) {
            Some(RuntimeState::Running) => {
                registry.update_state(app_id, RuntimeState::Suspended, None)
            },
            _ => false,
        }
    }

    /// Resume a suspended instance.
    pub async fn resume(&self, app_id: &str) -> bool {
        let mut registry = self.shared.registry.write().await;
        match registry.get(app_id).map(|instance| instance.state) {
            Some(RuntimeState::Suspended) => {
                registry.update_state(app_id, RuntimeState::Running, None)
            },
            _ => false,
        }
    }

    /// Tear down every instance. Returns how many were removed.
    pub async fn shutdown(&self) -> usize {
        let removed = self.shared.registry.write().await.clear();
        info!(removed, "Runtime host shut down");
        removed
    }

    /// The registry, for queries and subscriptions.
    #[must_use]
    pub fn registry(&self) -> Arc<RwLock<RuntimeRegistry>> {
        Arc::clone(&self.shared.registry)
    }

    /// The event bus the host publishes on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// The host's options.
    #[must_use]
    pub fn options(&self) -> &HostOptions {
        &self.shared.options
    }

    /// Counts by state.
    pub async fn stats(&self) -> RuntimeStats {
        self.shared.registry.read().await.stats()
    }

    /// Snapshots of every instance, ordered by app id.
    pub async fn instances(&self) -> Vec<InstanceSnapshot> {
        self.shared
            .registry
            .read()
            .await
            .get_all()
            .into_iter()
            .map(|instance| instance.snapshot())
            .collect()
    }
}

impl Drop for RuntimeHost {
    fn drop(&mut self) {
        self.router.abort();
    }
}

impl std::fmt::Debug for RuntimeHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHost")
            .field("options", &self.shared.options)
            .finish_non_exhaustive()
    }
}

// Holds an app id in the in-flight set for the duration of one spawn.
struct SpawnGuard<'a> {
    spawning: &'a DashSet<String>,
    app_id: String,
}

impl<'a> SpawnGuard<'a> {
    fn acquire(spawning: &'a DashSet<String>, app_id: &str) -> Option<Self> {
        spawning.insert(app_id.to_string()).then(|| Self {
            spawning,
            app_id: app_id.to_string(),
        })
    }
}

impl Drop for SpawnGuard<'_> {
    fn drop(&mut self) {
        self.spawning.remove(&self.app_id);
    }
}

fn already_running(app_id: &str) -> HostError {
    HostError::new(
        ErrorCode::AlreadyRunning,
        format!("{app_id} is already running"),
    )
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
