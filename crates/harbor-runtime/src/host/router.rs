//! The host loop.
//!
//! One task drains the host inbox. Each item is a channel event tagged with
//! the app id and pid of the spawn it came from, so messages from a unit
//! that has since been replaced are recognized and ignored.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{Instrument, debug, trace, warn};

use harbor_core::{Decision, ErrorCode, Pid, RuntimeState};
use harbor_events::{EventMetadata, RuntimeEvent};
use harbor_ipc::{ChannelEvent, Envelope, Intent, IntentRequest, MessageType};
use harbor_telemetry::RequestContext;

use super::{HostShared, millis};

const EVENT_SOURCE: &str = "host";

/// A channel event tagged with its spawn. `event` is `None` once the
/// unit's channel has closed.
#[derive(Debug)]
pub(crate) struct Inbound {
    pub(crate) app_id: String,
    pub(crate) pid: Pid,
    pub(crate) event: Option<ChannelEvent>,
}

pub(crate) struct Router {
    shared: Arc<HostShared>,
}

impl Router {
    pub(crate) fn new(shared: Arc<HostShared>) -> Self {
        Self { shared }
    }

    pub(crate) async fn run(self, mut inbox: mpsc::Receiver<Inbound>) {
        let mut watchdog = self.shared.options.heartbeat_grace.map(|grace| {
            let mut interval = tokio::time::interval(self.shared.options.watchdog_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            (interval, grace)
        });

        loop {
            tokio::select! {
                inbound = inbox.recv() => match inbound {
                    Some(inbound) => self.handle(inbound).await,
                    None => break,
                },
                grace = next_tick(&mut watchdog) => self.check_heartbeats(grace).await,
            }
        }

        debug!("Host loop stopped");
    }

    async fn handle(&self, inbound: Inbound) {
        let Inbound { app_id, pid, event } = inbound;
        match event {
            Some(ChannelEvent::Message(value)) => self.handle_message(&app_id, &pid, value).await,
            Some(ChannelEvent::Fault(reason)) => self.handle_fault(&app_id, &pid, reason).await,
            None => self.handle_closed(&app_id, &pid).await,
        }
    }

    async fn handle_message(&self, app_id: &str, pid: &Pid, value: serde_json::Value) {
        let envelope = match Envelope::from_value(value) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(app_id, %pid, error = %e, "Dropping invalid message");
                self.shared.events.publish(RuntimeEvent::InvalidMessage {
                    metadata: EventMetadata::new(EVENT_SOURCE),
                    app_id: app_id.to_string(),
                    reason: e.to_string(),
                });
                return;
            },
        };

        match self.shared.registry.read().await.get(app_id) {
            None => {
                warn!(
                    app_id,
                    code = %ErrorCode::RuntimeNotFound,
                    message_type = %envelope.kind,
                    "Message from unregistered app dropped"
                );
                return;
            },
            Some(instance) if &instance.pid != pid => {
                debug!(app_id, stale_pid = %pid, "Message from a replaced spawn ignored");
                return;
            },
            Some(_) => {},
        }

        if envelope.app_id != app_id {
            warn!(
                app_id,
                claimed = %envelope.app_id,
                message_type = %envelope.kind,
                "Envelope appId does not match its channel"
            );
            self.shared.events.publish(RuntimeEvent::InvalidMessage {
                metadata: EventMetadata::new(EVENT_SOURCE).with_trace_id(envelope.trace_id.clone()),
                app_id: app_id.to_string(),
                reason: format!("appId {} does not match the channel", envelope.app_id),
            });
            return;
        }

        if envelope.kind.is_host_only() {
            self.block_direct_api(app_id, &envelope).await;
            return;
        }

        match envelope.kind {
            MessageType::Ready => {
                let mut registry = self.shared.registry.write().await;
                // READY never resumes a suspended unit or revives a crashed one.
                if registry.get(app_id).is_some_and(|instance| {
                    matches!(instance.state, RuntimeState::Loading | RuntimeState::Running)
                }) {
                    registry.update_state(app_id, RuntimeState::Running, None);
                } else {
                    registry.update_heartbeat(app_id);
                }
            },
            MessageType::Heartbeat => {
                self.shared.registry.write().await.update_heartbeat(app_id);
            },
            MessageType::IntentRequest => {
                let ctx = RequestContext::with_trace_id("host", envelope.trace_id.clone())
                    .with_app_id(app_id)
                    .with_operation("intent");
                self.handle_intent(app_id, pid, envelope)
                    .instrument(ctx.span())
                    .await;
            },
            MessageType::IntentResponse => {
                debug!(app_id, request_id = %envelope.request_id, "Ignoring INTENT_RESPONSE from unit");
            },
            MessageType::Error => {
                let message = envelope
                    .error_message()
                    .unwrap_or_else(|| "unit reported an error".to_string());
                self.shared.registry.write().await.update_state(
                    app_id,
                    RuntimeState::Crashed,
                    Some(message),
                );
            },
            // Blocked above.
            MessageType::Init | MessageType::Terminate => {},
        }
    }

    async fn handle_intent(&self, app_id: &str, pid: &Pid, envelope: Envelope) {
        let spec = match envelope.intent_spec() {
            Ok(spec) => spec,
            Err(e) => {
                let denial = Denial::new(ErrorCode::InvalidIpcMessage, e.to_string());
                self.deny(app_id, &envelope, "unknown", "unknown", denial).await;
                return;
            },
        };

        let intent = match Intent::from_spec(&spec) {
            Ok(intent) => intent,
            Err(e) => {
                let denial = Denial::new(ErrorCode::InvalidIpcMessage, e.to_string());
                self.deny(app_id, &envelope, &spec.action, &spec.capability, denial)
                    .await;
                return;
            },
        };

        let required = intent.capability();
        if spec.capability != required.as_str() {
            let denial = Denial::new(
                ErrorCode::CapabilityDenied,
                format!(
                    "{} requires {required}, not {}",
                    spec.action, spec.capability
                ),
            );
            self.deny(app_id, &envelope, &spec.action, &spec.capability, denial)
                .await;
            return;
        }

        let (state, granted, sender) = {
            let registry = self.shared.registry.read().await;
            let Some(instance) = registry.get(app_id) else {
                return;
            };
            (
                instance.state,
                instance.has_capability(required),
                registry.sender(app_id),
            )
        };

        if state.is_terminal() {
            let code = match state {
                RuntimeState::Crashed => ErrorCode::RuntimeCrashed,
                _ => ErrorCode::RuntimeNotFound,
            };
            let denial = Denial::new(code, format!("{app_id} is {state}"));
            self.deny(app_id, &envelope, &spec.action, &spec.capability, denial)
                .await;
            return;
        }

        let refusal = if state == RuntimeState::Suspended {
            Some(format!("{app_id} is suspended"))
        } else if !granted {
            Some(format!("capability {required} not granted"))
        } else if let Some(limit) = self
            .shared
            .options
            .policies
            .get(required)
            .and_then(|policy| policy.rate_limit)
            && !self.shared.limiter.check(app_id, required, limit)
        {
            Some(format!(
                "rate limit exceeded for {required} ({} per {}ms)",
                limit.count, limit.window_ms
            ))
        } else {
            None
        };
        if let Some(reason) = refusal {
            let denial = Denial::new(ErrorCode::CapabilityDenied, reason);
            self.deny(app_id, &envelope, &spec.action, &spec.capability, denial)
                .await;
            return;
        }

        let Some(sender) = sender else {
            debug!(app_id, "Unit has no channel, intent dropped");
            return;
        };

        self.shared.events.publish(RuntimeEvent::IntentDecision {
            metadata: EventMetadata::new(EVENT_SOURCE).with_trace_id(envelope.trace_id.clone()),
            app_id: app_id.to_string(),
            action: spec.action.clone(),
            capability: spec.capability.clone(),
            decision: Decision::allow(),
        });
        debug!(app_id, action = %spec.action, capability = %required, "Intent allowed");

        let request = IntentRequest {
            request_id: envelope.request_id.clone(),
            app_id: app_id.to_string(),
            pid: pid.clone(),
            trace_id: envelope.trace_id.clone(),
            op_id: envelope.op_id.clone(),
            capability: required,
            intent,
        };
        let dispatcher = Arc::clone(&self.shared.dispatcher);
        tokio::spawn(
            async move {
                let outcome = dispatcher.dispatch(request).await;
                trace!(success = outcome.success, "Intent dispatched");
                let response = Envelope::intent_response(&envelope, &outcome);
                if sender.send(response).await.is_err() {
                    debug!("Unit went away before the intent response");
                }
            }
            .in_current_span(),
        );
    }

    async fn deny(
        &self,
        app_id: &str,
        request: &Envelope,
        action: &str,
        capability: &str,
        denial: Denial,
    ) {
        warn!(
            app_id,
            action,
            capability,
            code = %denial.code,
            reason = %denial.reason,
            "Intent denied"
        );
        self.shared.events.publish(RuntimeEvent::IntentDecision {
            metadata: EventMetadata::new(EVENT_SOURCE).with_trace_id(request.trace_id.clone()),
            app_id: app_id.to_string(),
            action: action.to_string(),
            capability: capability.to_string(),
            decision: Decision::deny(denial.reason.clone()),
        });
        self.reply(app_id, Envelope::deny(request, denial.code, &denial.reason))
            .await;
    }

    async fn block_direct_api(&self, app_id: &str, envelope: &Envelope) {
        warn!(
            app_id,
            code = %ErrorCode::DirectApiBlocked,
            message_type = %envelope.kind,
            "Unit sent a host-only message"
        );
        self.shared.events.publish(RuntimeEvent::DirectApiBlocked {
            metadata: EventMetadata::new(EVENT_SOURCE).with_trace_id(envelope.trace_id.clone()),
            app_id: app_id.to_string(),
            message_type: envelope.kind.as_str().to_string(),
        });
        let reason = format!("{} is reserved for the host", envelope.kind);
        self.reply(
            app_id,
            Envelope::error_reply(envelope, ErrorCode::DirectApiBlocked, &reason),
        )
        .await;
    }

    // Never blocks the loop: a unit that stops reading loses replies.
    async fn reply(&self, app_id: &str, envelope: Envelope) {
        let Some(sender) = self.shared.registry.read().await.sender(app_id) else {
            return;
        };
        match sender.try_send(envelope) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => warn!(app_id, "Unit channel full, reply dropped"),
            Err(TrySendError::Closed(_)) => debug!(app_id, "Unit channel closed, reply dropped"),
        }
    }

    async fn handle_fault(&self, app_id: &str, pid: &Pid, reason: String) {
        let mut registry = self.shared.registry.write().await;
        let current = registry
            .get(app_id)
            .is_some_and(|instance| &instance.pid == pid && instance.is_live());
        if current {
            registry.update_state(app_id, RuntimeState::Crashed, Some(reason));
        } else {
            debug!(app_id, %pid, %reason, "Fault from a stale spawn ignored");
        }
    }

    async fn handle_closed(&self, app_id: &str, pid: &Pid) {
        let mut registry = self.shared.registry.write().await;
        let current = registry
            .get(app_id)
            .is_some_and(|instance| &instance.pid == pid && instance.is_live());
        if current {
            debug!(app_id, %pid, "Unit closed its channel");
            registry.update_state(app_id, RuntimeState::Terminated, None);
        }
    }

    async fn check_heartbeats(&self, grace: Duration) {
        let now = Instant::now();
        let mut registry = self.shared.registry.write().await;
        let overdue: Vec<String> = registry
            .live_since()
            .filter(|(_, seen)| now.duration_since(*seen) > grace)
            .map(|(app_id, _)| app_id.to_string())
            .collect();

        for app_id in overdue {
            warn!(app_id = %app_id, grace_ms = millis(grace), "Heartbeat overdue");
            registry.update_state(
                &app_id,
                RuntimeState::Crashed,
                Some("heartbeat timeout".to_string()),
            );
        }
    }
}

struct Denial {
    code: ErrorCode,
    reason: String,
}

impl Denial {
    fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

async fn next_tick(watchdog: &mut Option<(Interval, Duration)>) -> Duration {
    match watchdog {
        Some((interval, grace)) => {
            interval.tick().await;
            *grace
        },
        None => std::future::pending().await,
    }
}
