//! The unit side of the envelope protocol.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use harbor_capabilities::Capability;
use harbor_core::{ErrorCode, new_op_id};
use harbor_ipc::{ChannelEvent, Envelope, Intent, IpcError, MessageType, PendingRequests, UnitPort};

use crate::error::{BridgeError, BridgeResult};

#[derive(Debug, Clone)]
struct Session {
    app_id: String,
    capabilities: BTreeSet<Capability>,
    intent_timeout: Duration,
}

#[derive(Debug)]
struct Shared {
    outbound: mpsc::Sender<ChannelEvent>,
    pending: PendingRequests<Envelope>,
    session: watch::Sender<Option<Session>>,
    shutdown: CancellationToken,
}

impl Shared {
    async fn send(&self, envelope: &Envelope) -> BridgeResult<()> {
        let value = serde_json::to_value(envelope).map_err(IpcError::from)?;
        self.outbound
            .send(ChannelEvent::Message(value))
            .await
            .map_err(|_| BridgeError::Closed)
    }

    async fn on_init(self: &Arc<Self>, init: &Envelope) {
        if self.session.borrow().is_some() {
            warn!(app_id = %init.app_id, "Duplicate INIT ignored");
            return;
        }

        let payload = match init.init_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(app_id = %init.app_id, error = %e, "Malformed INIT");
                let report =
                    Envelope::error(&init.app_id, ErrorCode::InvalidIpcMessage, &e.to_string());
                if self.send(&report).await.is_err() {
                    debug!("Host went away before the INIT error");
                }
                return;
            },
        };

        if let Err(e) = self.send(&Envelope::ready(init)).await {
            warn!(app_id = %init.app_id, error = %e, "Could not send READY");
            return;
        }

        let session = Session {
            app_id: init.app_id.clone(),
            capabilities: payload.capabilities.iter().copied().collect(),
            intent_timeout: Duration::from_millis(payload.intent_timeout_ms),
        };
        info!(
            app_id = %session.app_id,
            capabilities = session.capabilities.len(),
            "Unit initialized"
        );
        self.session.send_replace(Some(session));

        let period = Duration::from_millis(payload.heartbeat_interval_ms);
        if !period.is_zero() {
            let first = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
            tokio::spawn(heartbeat(
                Arc::clone(self),
                init.app_id.clone(),
                first,
                period,
            ));
        }
    }
}

/// A unit's connection to its host.
///
/// Cloning is cheap; clones share the connection. The bridge reads host
/// envelopes on a background task from the moment it is connected, so it
/// must be created inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct Bridge {
    shared: Arc<Shared>,
}

impl Bridge {
    /// Connect over a pair of channels.
    #[must_use]
    pub fn connect(outbound: mpsc::Sender<ChannelEvent>, inbound: mpsc::Receiver<Envelope>) -> Self {
        let (session, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            outbound,
            pending: PendingRequests::default(),
            session,
            shutdown: CancellationToken::new(),
        });
        tokio::spawn(read_loop(Arc::clone(&shared), inbound));
        Self { shared }
    }

    /// Connect over the port an in-process launcher hands its program.
    #[must_use]
    pub fn from_port(port: UnitPort) -> Self {
        Self::connect(port.outbound, port.inbound)
    }

    /// Connect over newline-delimited JSON on stdin and stdout, the way
    /// process units talk to their host.
    #[must_use]
    pub fn stdio() -> Self {
        let (outbound, inbound) = crate::stdio::spawn();
        Self::connect(outbound, inbound)
    }

    /// Wait for `INIT` to be received and answered.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Closed`] if the host goes away first.
    pub async fn ready(&self) -> BridgeResult<()> {
        let mut session = self.shared.session.subscribe();
        tokio::select! {
            biased;
            initialized = session.wait_for(Option::is_some) => {
                initialized.map(|_| ()).map_err(|_| BridgeError::Closed)
            },
            () = self.shared.shutdown.cancelled() => Err(BridgeError::Closed),
        }
    }

    /// The app id from `INIT`.
    #[must_use]
    pub fn app_id(&self) -> Option<String> {
        self.shared
            .session
            .borrow()
            .as_ref()
            .map(|session| session.app_id.clone())
    }

    /// Capabilities granted in `INIT`, in order.
    #[must_use]
    pub fn capabilities(&self) -> Vec<Capability> {
        self.shared
            .session
            .borrow()
            .as_ref()
            .map(|session| session.capabilities.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `capability` was granted.
    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.shared
            .session
            .borrow()
            .as_ref()
            .is_some_and(|session| session.capabilities.contains(&capability))
    }

    /// Whether the host terminated the bridge or went away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Wait until the bridge is closed.
    pub async fn closed(&self) {
        self.shared.shutdown.cancelled().await;
    }

    /// Stop reading, heartbeating and fail outstanding requests.
    pub fn close(&self) {
        self.shared.shutdown.cancel();
    }

    /// Ask the host to perform `intent` and return the response data
    /// (`null` when the host sent none).
    ///
    /// # Errors
    ///
    /// [`BridgeError::CapabilityDenied`] without contacting the host if the
    /// capability was not granted; otherwise whatever the host answered,
    /// or [`BridgeError::Timeout`].
    pub async fn request(&self, intent: Intent) -> BridgeResult<Value> {
        let session = self.session()?;
        let capability = intent.capability();
        if !session.capabilities.contains(&capability) {
            debug!(
                action = intent.action(),
                %capability,
                "Capability not granted, intent not sent"
            );
            return Err(BridgeError::CapabilityDenied(capability));
        }

        let spec = intent.to_spec()?;
        let envelope =
            Envelope::intent_request(&session.app_id, &spec, new_op_id(intent.action()));
        let reply = self
            .round_trip(envelope, intent.action(), session.intent_timeout)
            .await?;
        outcome(reply)
    }

    /// Send a raw envelope and wait for the reply carrying its request id.
    ///
    /// # Errors
    ///
    /// [`BridgeError::DirectApiBlocked`] when the host refuses a host-only
    /// message type, [`BridgeError::Failed`] for any other `ERROR` reply,
    /// and [`BridgeError::Timeout`] when nothing comes back.
    pub async fn exchange(&self, envelope: Envelope) -> BridgeResult<Envelope> {
        let session = self.session()?;
        let action = envelope.kind.as_str();
        let reply = self
            .round_trip(envelope, action, session.intent_timeout)
            .await?;
        if reply.kind == MessageType::Error {
            return Err(error_reply(&reply));
        }
        Ok(reply)
    }

    /// Tell the host the unit failed. The host marks it crashed.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotReady`] before `INIT`, [`BridgeError::Closed`] if
    /// the host is gone.
    pub async fn report_error(&self, message: &str) -> BridgeResult<()> {
        let session = self.session()?;
        warn!(app_id = %session.app_id, message, "Reporting unit error");
        self.shared
            .send(&Envelope::error(
                &session.app_id,
                ErrorCode::RuntimeCrashed,
                message,
            ))
            .await
    }

    /// Read a file.
    ///
    /// # Errors
    ///
    /// See [`Bridge::request`].
    pub async fn read_file(&self, path: impl Into<String>) -> BridgeResult<Value> {
        self.request(Intent::ReadFile { path: path.into() }).await
    }

    /// Write a file.
    ///
    /// # Errors
    ///
    /// See [`Bridge::request`].
    pub async fn write_file(
        &self,
        path: impl Into<String>,
        contents: impl Into<String>,
    ) -> BridgeResult<Value> {
        self.request(Intent::WriteFile {
            path: path.into(),
            contents: contents.into(),
        })
        .await
    }

    /// Read a scratch value.
    ///
    /// # Errors
    ///
    /// See [`Bridge::request`].
    pub async fn temp_get(&self, key: impl Into<String>) -> BridgeResult<Value> {
        self.request(Intent::TempGet { key: key.into() }).await
    }

    /// Store a scratch value.
    ///
    /// # Errors
    ///
    /// See [`Bridge::request`].
    pub async fn temp_put(&self, key: impl Into<String>, value: Value) -> BridgeResult<Value> {
        self.request(Intent::TempPut {
            key: key.into(),
            value,
        })
        .await
    }

    /// Post a notification.
    ///
    /// # Errors
    ///
    /// See [`Bridge::request`].
    pub async fn notify(&self, title: impl Into<String>, body: Option<&str>) -> BridgeResult<Value> {
        self.request(Intent::Notify {
            title: title.into(),
            body: body.map(str::to_string),
        })
        .await
    }

    /// Open a shell window.
    ///
    /// # Errors
    ///
    /// See [`Bridge::request`].
    pub async fn open_window(
        &self,
        title: impl Into<String>,
        url: Option<&str>,
    ) -> BridgeResult<Value> {
        self.request(Intent::OpenWindow {
            title: title.into(),
            url: url.map(str::to_string),
            width: None,
            height: None,
        })
        .await
    }

    /// `GET` a URL.
    ///
    /// # Errors
    ///
    /// See [`Bridge::request`].
    pub async fn fetch(&self, url: impl Into<String>) -> BridgeResult<Value> {
        self.request(Intent::Fetch {
            url: url.into(),
            method: None,
            headers: std::collections::BTreeMap::new(),
            body: None,
        })
        .await
    }

    /// Spawn a host process.
    ///
    /// # Errors
    ///
    /// See [`Bridge::request`].
    pub async fn spawn_process<I, S>(&self, command: impl Into<String>, args: I) -> BridgeResult<Value>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request(Intent::SpawnProcess {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        })
        .await
    }

    /// Read audit log entries.
    ///
    /// # Errors
    ///
    /// See [`Bridge::request`].
    pub async fn read_audit_logs(&self, limit: Option<u32>) -> BridgeResult<Value> {
        self.request(Intent::ReadAuditLog { limit }).await
    }

    fn session(&self) -> BridgeResult<Session> {
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }
        self.shared
            .session
            .borrow()
            .clone()
            .ok_or(BridgeError::NotReady)
    }

    async fn round_trip(
        &self,
        envelope: Envelope,
        action: &str,
        timeout: Duration,
    ) -> BridgeResult<Envelope> {
        let waiter = self.shared.pending.register(envelope.request_id.clone());
        trace!(request_id = %envelope.request_id, action, "Sending request");
        self.shared.send(&envelope).await?;

        match waiter.wait_for(timeout).await {
            Ok(reply) => Ok(reply),
            Err(IpcError::Timeout { timeout_ms, .. }) => {
                warn!(action, timeout_ms, "Request timed out");
                Err(BridgeError::Timeout {
                    action: action.to_string(),
                    timeout_ms,
                })
            },
            Err(IpcError::Cancelled(_)) => Err(BridgeError::Closed),
            Err(e) => Err(e.into()),
        }
    }
}

fn outcome(reply: Envelope) -> BridgeResult<Value> {
    if reply.kind == MessageType::Error {
        return Err(error_reply(&reply));
    }
    if reply.success == Some(true) {
        return Ok(reply.data.unwrap_or(Value::Null));
    }

    let message = reply
        .error_message()
        .unwrap_or_else(|| "no reason given".to_string());
    match reply.decision {
        Some(decision) if !decision.is_allowed() => {
            Err(BridgeError::Denied(decision.reason.unwrap_or(message)))
        },
        _ => Err(BridgeError::Failed(message)),
    }
}

fn error_reply(reply: &Envelope) -> BridgeError {
    let message = reply.error_message().unwrap_or_default();
    if reply.error_code() == Some(ErrorCode::DirectApiBlocked) {
        BridgeError::DirectApiBlocked(message)
    } else {
        BridgeError::Failed(message)
    }
}

async fn read_loop(shared: Arc<Shared>, mut inbound: mpsc::Receiver<Envelope>) {
    loop {
        let envelope = tokio::select! {
            () = shared.shutdown.cancelled() => break,
            received = inbound.recv() => match received {
                Some(envelope) => envelope,
                None => {
                    debug!("Host closed the channel");
                    break;
                },
            },
        };
        trace!(
            message_type = %envelope.kind,
            request_id = %envelope.request_id,
            "Received envelope"
        );

        match envelope.kind {
            MessageType::Init => shared.on_init(&envelope).await,
            MessageType::IntentResponse => {
                let request_id = envelope.request_id.clone();
                if !shared.pending.resolve(&request_id, envelope) {
                    debug!(request_id = %request_id, "Late or unknown response dropped");
                }
            },
            MessageType::Error if shared.pending.contains(&envelope.request_id) => {
                let request_id = envelope.request_id.clone();
                shared.pending.resolve(&request_id, envelope);
            },
            MessageType::Error => warn!(
                error = envelope.error_message().as_deref().unwrap_or("unknown"),
                "Host reported an error"
            ),
            MessageType::Terminate => {
                info!(app_id = %envelope.app_id, "Host requested termination");
                break;
            },
            other => debug!(message_type = %other, "Ignoring envelope"),
        }
    }

    shared.shutdown.cancel();
    shared.pending.clear();
}

async fn heartbeat(shared: Arc<Shared>, app_id: String, first: Instant, period: Duration) {
    let mut ticks = tokio::time::interval_at(first, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shared.shutdown.cancelled() => break,
            _ = ticks.tick() => {
                if shared.send(&Envelope::heartbeat(&app_id)).await.is_err() {
                    break;
                }
            },
        }
    }
    trace!(app_id = %app_id, "Heartbeat stopped");
}
