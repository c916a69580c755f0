//! End-to-end tests of the runtime host with in-process units.
//!
//! Units are either real [`Bridge`]s handed back to the test, or raw ports
//! the test drives by hand to say things a well-behaved bridge never would.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use harbor_capabilities::{Capability, CapabilityPolicy, DenialReason, PolicyTable, TrustLevel};
use harbor_core::{ErrorCode, RuntimeState};
use harbor_events::{EventBus, EventReceiver, RuntimeEvent};
use harbor_ipc::{
    ChannelEvent, Envelope, IntentOutcome, IntentRequest, IntentSpec, MessageType, UnitPort,
    unit_channel,
};
use harbor_runtime::prelude::*;
use harbor_runtime::{LaunchError, LaunchSpec, LaunchedUnit, UnitChannel, UnitHandle};
use harbor_sdk::{Bridge, BridgeError};

#[derive(Default)]
struct Recording {
    seen: Mutex<Vec<IntentRequest>>,
}

#[async_trait]
impl IntentDispatcher for Recording {
    async fn dispatch(&self, request: IntentRequest) -> IntentOutcome {
        let data = json!({ "handled": request.intent.action() });
        self.seen.lock().unwrap().push(request.clone());
        IntentOutcome::ok(&request, Some(data))
    }
}

struct Harness {
    host: RuntimeHost,
    dispatcher: Arc<Recording>,
    bridges: mpsc::UnboundedReceiver<Bridge>,
    ports: mpsc::UnboundedReceiver<UnitPort>,
    events: EventReceiver,
}

const BRIDGE: &str = "bridge";
const RAW: &str = "raw";
const SILENT: &str = "silent";
const PANICS: &str = "panics";
const EXITS: &str = "exits";

async fn bails_after_init(mut port: UnitPort) {
    let _ = port.inbound.recv().await;
    panic!("boom");
}

async fn exits_after_ready(mut port: UnitPort) {
    if let Some(init) = port.inbound.recv().await {
        let ready = serde_json::to_value(Envelope::ready(&init)).unwrap();
        let _ = port.outbound.send(ChannelEvent::Message(ready)).await;
    }
}

async fn holds_port_forever(port: UnitPort) {
    let _port = port;
    std::future::pending::<()>().await;
}

fn launcher() -> (
    InProcessLauncher,
    mpsc::UnboundedReceiver<Bridge>,
    mpsc::UnboundedReceiver<UnitPort>,
) {
    let (bridge_tx, bridges) = mpsc::unbounded_channel();
    let (port_tx, ports) = mpsc::unbounded_channel();

    let launcher = InProcessLauncher::new()
        .with_program(BRIDGE, move |port: UnitPort| {
            let bridge_tx = bridge_tx.clone();
            async move {
                let bridge = Bridge::from_port(port);
                let _ = bridge_tx.send(bridge.clone());
                bridge.closed().await;
            }
        })
        .with_program(RAW, move |port: UnitPort| {
            let port_tx = port_tx.clone();
            async move {
                let _ = port_tx.send(port);
            }
        })
        .with_program(SILENT, holds_port_forever)
        .with_program(PANICS, bails_after_init)
        .with_program(EXITS, exits_after_ready);

    (launcher, bridges, ports)
}

fn harness(options: HostOptions) -> Harness {
    let (launcher, bridges, ports) = launcher();
    let dispatcher = Arc::new(Recording::default());
    let bus = EventBus::new();
    let events = bus.subscribe();
    let host = RuntimeHost::start(
        options,
        Arc::new(launcher),
        Arc::clone(&dispatcher) as Arc<dyn IntentDispatcher>,
        bus,
    );
    Harness {
        host,
        dispatcher,
        bridges,
        ports,
        events,
    }
}

impl Harness {
    async fn spawn_bridge(&mut self, app_id: &str, capabilities: &[&str]) -> Bridge {
        let manifest = AppManifest::new(app_id, BRIDGE).with_capabilities(capabilities.to_vec());
        self.host.spawn(manifest, false).await.unwrap();
        let bridge = self.bridges.recv().await.unwrap();
        bridge.ready().await.unwrap();
        bridge
    }

    async fn spawn_raw(&mut self, app_id: &str, capabilities: &[&str]) -> RawUnit {
        let manifest = AppManifest::new(app_id, RAW).with_capabilities(capabilities.to_vec());
        self.host.spawn(manifest, false).await.unwrap();
        let mut port = self.ports.recv().await.unwrap();
        let init = port.inbound.recv().await.unwrap();
        assert_eq!(init.kind, MessageType::Init);
        RawUnit {
            app_id: app_id.to_string(),
            port,
        }
    }

    async fn state(&self, app_id: &str) -> Option<RuntimeState> {
        let registry = self.host.registry();
        let registry = registry.read().await;
        registry.get(app_id).map(|instance| instance.state)
    }

    async fn wait_for_event<F>(&mut self, mut predicate: F) -> Arc<RuntimeEvent>
    where
        F: FnMut(&RuntimeEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = self.events.recv().await.unwrap();
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("event did not arrive")
    }

    async fn wait_for_state(&mut self, app_id: &str, state: RuntimeState) {
        self.wait_for_event(|event| {
            matches!(
                event,
                RuntimeEvent::StateChanged { app_id: id, to, .. } if id == app_id && *to == state
            )
        })
        .await;
    }
}

struct RawUnit {
    app_id: String,
    port: UnitPort,
}

impl RawUnit {
    async fn send(&self, envelope: &Envelope) {
        self.send_value(serde_json::to_value(envelope).unwrap()).await;
    }

    async fn send_value(&self, value: Value) {
        self.port
            .outbound
            .send(ChannelEvent::Message(value))
            .await
            .unwrap();
    }

    async fn intent(&mut self, action: &str, capability: &str, params: Value) -> Envelope {
        let spec = IntentSpec::new(action, capability, Some(params));
        let request = Envelope::intent_request(&self.app_id, &spec, format!("op-{action}"));
        self.send(&request).await;
        let reply = self.recv().await;
        assert_eq!(reply.request_id, request.request_id);
        assert_eq!(reply.trace_id, request.trace_id);
        reply
    }

    async fn recv(&mut self) -> Envelope {
        tokio::time::timeout(Duration::from_secs(5), self.port.inbound.recv())
            .await
            .expect("no reply from host")
            .expect("host closed the channel")
    }
}

#[tokio::test]
async fn spawned_unit_runs_and_round_trips_intents() {
    let mut h = harness(HostOptions::default());
    let bridge = h.spawn_bridge("core.notes", &["fs.read", "ui.notify"]).await;

    assert_eq!(
        bridge.capabilities(),
        vec![Capability::FsRead, Capability::Notify]
    );
    assert_eq!(h.state("core.notes").await, Some(RuntimeState::Running));

    let data = bridge.read_file("/apps/notes/today.md").await.unwrap();
    assert_eq!(data, json!({ "handled": "fs.read" }));

    let seen = h.dispatcher.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].app_id, "core.notes");
    assert_eq!(seen[0].capability, Capability::FsRead);
    assert!(seen[0].op_id.as_deref().unwrap().starts_with("fs.read"));

    let allowed = h
        .wait_for_event(|event| matches!(event, RuntimeEvent::IntentDecision { .. }))
        .await;
    match &*allowed {
        RuntimeEvent::IntentDecision {
            action, decision, ..
        } => {
            assert_eq!(action, "fs.read");
            assert!(decision.is_allowed());
        },
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn spawn_reports_granted_and_denied_capabilities() {
    let h = harness(HostOptions::default());

    let third_party = AppManifest::new("acme.editor", BRIDGE)
        .with_capabilities(["fs.read", "fs.write", "fs.format"]);
    let spawned = h.host.spawn(third_party, false).await.unwrap();
    assert_eq!(spawned.granted, vec![Capability::FsRead]);
    assert_eq!(
        spawned.denied.get("fs.write"),
        Some(&DenialReason::TrustLevel(TrustLevel::ThirdPartyUnverified))
    );
    assert_eq!(
        spawned.denied.get("fs.format"),
        Some(&DenialReason::UnknownCapability)
    );

    let first_party = AppManifest::new("core.editor", BRIDGE).with_capabilities(["fs.write"]);
    let spawned = h.host.spawn(first_party, false).await.unwrap();
    assert_eq!(spawned.granted, vec![Capability::FsWrite]);
}

#[tokio::test]
async fn audit_access_needs_an_admin() {
    let h = harness(HostOptions::default());

    let manifest = AppManifest::new("core.auditor", BRIDGE).with_capabilities(["audit.read"]);
    let spawned = h.host.spawn(manifest.clone(), false).await.unwrap();
    assert!(spawned.granted.is_empty());
    assert_eq!(
        spawned.denied.get("audit.read"),
        Some(&DenialReason::RequiresAdmin)
    );

    assert!(h.host.terminate("core.auditor").await);
    let spawned = h.host.spawn(manifest, true).await.unwrap();
    assert_eq!(spawned.granted, vec![Capability::ReadAudit]);
}

#[tokio::test]
async fn ungranted_capability_is_refused_locally() {
    let mut h = harness(HostOptions::default());
    let bridge = h.spawn_bridge("acme.viewer", &["fs.read"]).await;

    assert!(matches!(
        bridge.spawn_process("ls", ["-l"]).await,
        Err(BridgeError::CapabilityDenied(Capability::SpawnProcess))
    ));
    assert!(h.dispatcher.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn host_checks_every_intent_itself() {
    let mut h = harness(HostOptions::default());
    let mut unit = h.spawn_raw("acme.viewer", &["fs.read"]).await;

    // Not granted.
    let reply = unit
        .intent("ui.notify", "ui.notify", json!({ "title": "hi" }))
        .await;
    assert_eq!(reply.kind, MessageType::IntentResponse);
    assert_eq!(reply.success, Some(false));
    assert_eq!(reply.error_code(), Some(ErrorCode::CapabilityDenied));
    assert_eq!(
        reply.error_message().as_deref(),
        Some("capability ui.notify not granted")
    );
    assert!(!reply.decision.unwrap().is_allowed());

    // Declares a granted capability for an action that needs another one.
    let reply = unit
        .intent("fs.write", "fs.read", json!({ "path": "/apps/x", "contents": "" }))
        .await;
    assert_eq!(reply.error_code(), Some(ErrorCode::CapabilityDenied));
    assert_eq!(
        reply.error_message().as_deref(),
        Some("fs.write requires fs.write, not fs.read")
    );

    // Unknown action.
    let reply = unit.intent("fs.format", "fs.read", json!({})).await;
    assert_eq!(reply.error_code(), Some(ErrorCode::InvalidIpcMessage));

    // Granted.
    let reply = unit
        .intent("fs.read", "fs.read", json!({ "path": "/apps/x" }))
        .await;
    assert_eq!(reply.success, Some(true));
    assert_eq!(reply.data, Some(json!({ "handled": "fs.read" })));

    assert_eq!(h.dispatcher.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn rate_limits_deny_excess_intents() {
    let policies = PolicyTable::builtin().with_policy(
        Capability::Notify,
        CapabilityPolicy::any_trust().with_rate_limit(2, 60_000),
    );
    let mut h = harness(HostOptions::default().with_policies(policies));
    let bridge = h.spawn_bridge("core.chat", &["ui.notify"]).await;

    bridge.notify("one", None).await.unwrap();
    bridge.notify("two", None).await.unwrap();
    match bridge.notify("three", None).await {
        Err(BridgeError::Denied(reason)) => {
            assert!(reason.starts_with("rate limit exceeded for ui.notify"));
        },
        other => panic!("expected a rate limit denial, got {other:?}"),
    }
    assert_eq!(h.dispatcher.seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn host_only_messages_are_blocked() {
    let mut h = harness(HostOptions::default());
    let bridge = h.spawn_bridge("acme.rogue", &[]).await;

    let result = bridge.exchange(Envelope::terminate("acme.rogue")).await;
    match result {
        Err(BridgeError::DirectApiBlocked(message)) => {
            assert_eq!(message, "TERMINATE is reserved for the host");
        },
        other => panic!("expected a blocked call, got {other:?}"),
    }

    let blocked = h
        .wait_for_event(|event| matches!(event, RuntimeEvent::DirectApiBlocked { .. }))
        .await;
    assert_eq!(blocked.app_id(), Some("acme.rogue"));
    assert_eq!(h.state("acme.rogue").await, Some(RuntimeState::Running));
}

#[tokio::test]
async fn malformed_and_misaddressed_messages_are_dropped() {
    let mut h = harness(HostOptions::default());
    let mut unit = h.spawn_raw("acme.noisy", &["fs.read"]).await;

    unit.send_value(json!({ "type": "HEARTBEAT", "appId": "acme.noisy" }))
        .await;
    h.wait_for_event(|event| matches!(event, RuntimeEvent::InvalidMessage { .. }))
        .await;

    unit.send_value(json!({
        "type": "SHOUT",
        "requestId": "r", "appId": "acme.noisy", "traceId": "t"
    }))
    .await;
    h.wait_for_event(|event| matches!(event, RuntimeEvent::InvalidMessage { .. }))
        .await;

    // Claims to be another app.
    let spec = IntentSpec::new("fs.read", "fs.read", Some(json!({ "path": "/apps/x" })));
    unit.send(&Envelope::intent_request("core.files", &spec, "op".into()))
        .await;
    let event = h
        .wait_for_event(|event| matches!(event, RuntimeEvent::InvalidMessage { .. }))
        .await;
    assert_eq!(event.app_id(), Some("acme.noisy"));

    // The unit is still served afterwards.
    let reply = unit
        .intent("fs.read", "fs.read", json!({ "path": "/apps/x" }))
        .await;
    assert_eq!(reply.success, Some(true));
    assert_eq!(h.dispatcher.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn spawning_a_live_app_twice_fails() {
    let h = harness(HostOptions::default());
    let manifest = AppManifest::new("core.clock", BRIDGE);

    let (first, second) = tokio::join!(
        h.host.spawn(manifest.clone(), false),
        h.host.spawn(manifest.clone(), false)
    );
    let errors: Vec<HostError> = [first, second].into_iter().filter_map(Result::err).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::AlreadyRunning);

    let again = h.host.spawn(manifest, false).await.unwrap_err();
    assert_eq!(again.code, ErrorCode::AlreadyRunning);
    assert_eq!(h.host.stats().await.total, 1);
}

#[tokio::test]
async fn invalid_and_unsupported_manifests_fail() {
    let h = harness(HostOptions::default());

    let traversal = AppManifest::new("core.sneaky", "../../bin/sh");
    let error = h.host.spawn(traversal, false).await.unwrap_err();
    assert_eq!(error.code, ErrorCode::InvalidManifest);

    let wasm = AppManifest::new("core.wasm", BRIDGE).with_runtime(RuntimeKind::Wasm);
    let error = h.host.spawn(wasm, false).await.unwrap_err();
    assert_eq!(error.code, ErrorCode::SpawnFailed);

    let missing = AppManifest::new("core.ghost", "nowhere");
    let error = h.host.spawn(missing, false).await.unwrap_err();
    assert_eq!(error.code, ErrorCode::SpawnFailed);
    assert!(error.reason.contains("nowhere"));

    assert!(h.host.registry().read().await.is_empty());
}

struct StuckLauncher;

#[async_trait]
impl UnitLauncher for StuckLauncher {
    fn supports(&self, kind: &RuntimeKind) -> bool {
        matches!(kind, RuntimeKind::Process)
    }

    async fn launch(&self, _spec: &LaunchSpec) -> Result<LaunchedUnit, LaunchError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Err(LaunchError::Other("unreachable".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn slow_launches_time_out() {
    let options = HostOptions::default().with_spawn_timeout(Duration::from_secs(2));
    let host = RuntimeHost::start(
        options,
        Arc::new(StuckLauncher),
        Arc::new(DenyAllDispatcher),
        EventBus::new(),
    );

    let error = host
        .spawn(AppManifest::new("core.slow", "slow"), false)
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::SpawnFailed);
    assert_eq!(error.reason, "unit did not start within 2000ms");
    assert!(host.registry().read().await.is_empty());
}

struct StubbornHandle;

impl UnitHandle for StubbornHandle {
    fn dispose(&mut self) -> Result<(), String> {
        Err("unit refused to stop".into())
    }
}

#[derive(Default)]
struct StubbornLauncher {
    ports: Mutex<Vec<UnitPort>>,
}

#[async_trait]
impl UnitLauncher for StubbornLauncher {
    fn supports(&self, kind: &RuntimeKind) -> bool {
        matches!(kind, RuntimeKind::Process)
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchedUnit, LaunchError> {
        let (sender, events, port) = unit_channel(spec.channel_capacity);
        self.ports.lock().unwrap().push(port);
        Ok(LaunchedUnit {
            channel: UnitChannel::new(sender, Box::new(StubbornHandle)),
            events,
        })
    }
}

#[tokio::test]
async fn terminate_survives_failing_disposal() {
    let launcher = Arc::new(StubbornLauncher::default());
    let host = RuntimeHost::start(
        HostOptions::default(),
        Arc::clone(&launcher) as Arc<dyn UnitLauncher>,
        Arc::new(DenyAllDispatcher),
        EventBus::new(),
    );
    host.spawn(AppManifest::new("core.stubborn", "stubborn"), false)
        .await
        .unwrap();

    assert!(host.terminate("core.stubborn").await);
    assert!(host.registry().read().await.get("core.stubborn").is_none());
    assert!(!host.terminate("core.stubborn").await);

    // The unit was told to stop before it was disposed.
    let mut port = launcher.ports.lock().unwrap().pop().unwrap();
    assert_eq!(port.inbound.recv().await.unwrap().kind, MessageType::Init);
    assert_eq!(
        port.inbound.recv().await.unwrap().kind,
        MessageType::Terminate
    );
}

#[tokio::test]
async fn terminated_bridge_closes() {
    let mut h = harness(HostOptions::default());
    let bridge = h.spawn_bridge("core.notes", &["ui.notify"]).await;

    assert!(h.host.terminate("core.notes").await);
    tokio::time::timeout(Duration::from_secs(5), bridge.closed())
        .await
        .unwrap();
    assert!(matches!(
        bridge.notify("bye", None).await,
        Err(BridgeError::Closed)
    ));
}

#[tokio::test]
async fn reported_errors_crash_the_instance() {
    let mut h = harness(HostOptions::default());
    let bridge = h.spawn_bridge("core.fragile", &[]).await;

    bridge.report_error("out of paper").await.unwrap();
    h.wait_for_state("core.fragile", RuntimeState::Crashed)
        .await;

    let registry = h.host.registry();
    let registry = registry.read().await;
    let instance = registry.get("core.fragile").unwrap();
    assert_eq!(instance.error.as_deref(), Some("out of paper"));
    assert_eq!(instance.crash_count, 1);
}

#[tokio::test]
async fn every_reported_error_is_counted() {
    let mut h = harness(HostOptions::default());
    let mut unit = h.spawn_raw("core.flaky", &["ui.notify"]).await;

    for n in 1..=3 {
        let error = Envelope::error("core.flaky", ErrorCode::RuntimeCrashed, &format!("fault {n}"));
        unit.send(&error).await;
    }
    h.wait_for_event(|event| {
        matches!(
            event,
            RuntimeEvent::StateChanged { app_id, to: RuntimeState::Crashed, crash_count: 3, .. }
                if app_id == "core.flaky"
        )
    })
    .await;

    {
        let registry = h.host.registry();
        let registry = registry.read().await;
        let instance = registry.get("core.flaky").unwrap();
        assert_eq!(instance.state, RuntimeState::Crashed);
        assert_eq!(instance.crash_count, 3);
        assert_eq!(instance.error.as_deref(), Some("fault 3"));
    }

    // Still attached, but a crashed instance gets no intents.
    let reply = unit
        .intent("ui.notify", "ui.notify", json!({ "title": "still here?" }))
        .await;
    assert_eq!(reply.success, Some(false));
    assert_eq!(reply.error_code(), Some(ErrorCode::RuntimeCrashed));
    assert_eq!(
        reply.error_message().as_deref(),
        Some("core.flaky is CRASHED")
    );
    assert!(h.dispatcher.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn a_crashed_bridge_stays_connected_until_terminated() {
    let mut h = harness(HostOptions::default());
    let bridge = h.spawn_bridge("core.fragile", &[]).await;

    bridge.report_error("jam").await.unwrap();
    h.wait_for_state("core.fragile", RuntimeState::Crashed)
        .await;
    bridge.report_error("jam again").await.unwrap();
    h.wait_for_event(|event| {
        matches!(event, RuntimeEvent::StateChanged { crash_count: 2, .. })
    })
    .await;
    assert!(!bridge.is_closed());

    assert!(h.host.terminate("core.fragile").await);
    tokio::time::timeout(Duration::from_secs(5), bridge.closed())
        .await
        .unwrap();
}

#[tokio::test]
async fn panicking_units_crash() {
    let mut h = harness(HostOptions::default());
    let _ = h
        .host
        .spawn(AppManifest::new("core.bomb", PANICS), false)
        .await;

    h.wait_for_state("core.bomb", RuntimeState::Crashed).await;
    let registry = h.host.registry();
    let registry = registry.read().await;
    assert_eq!(
        registry.get("core.bomb").unwrap().error.as_deref(),
        Some("unit panicked")
    );
}

#[tokio::test]
async fn crashed_apps_can_be_respawned() {
    let mut h = harness(HostOptions::default());
    let bridge = h.spawn_bridge("core.phoenix", &[]).await;
    bridge.report_error("first fall").await.unwrap();
    h.wait_for_state("core.phoenix", RuntimeState::Crashed)
        .await;

    let bridge = h.spawn_bridge("core.phoenix", &[]).await;
    assert!(!bridge.is_closed());

    let registry = h.host.registry();
    let registry = registry.read().await;
    let instance = registry.get("core.phoenix").unwrap();
    assert_eq!(instance.state, RuntimeState::Running);
    assert_eq!(instance.crash_count, 1);
}

#[tokio::test]
async fn a_unit_that_exits_is_terminated() {
    let mut h = harness(HostOptions::default());
    let _ = h
        .host
        .spawn(AppManifest::new("core.brief", EXITS), false)
        .await;

    h.wait_for_state("core.brief", RuntimeState::Terminated)
        .await;
}

#[tokio::test]
async fn suspended_units_get_no_intents() {
    let mut h = harness(HostOptions::default());
    let bridge = h.spawn_bridge("core.player", &["ui.window"]).await;

    assert!(h.host.suspend("core.player").await);
    assert!(!h.host.suspend("core.player").await);
    match bridge.open_window("Player", None).await {
        Err(BridgeError::Denied(reason)) => assert_eq!(reason, "core.player is suspended"),
        other => panic!("expected a denial, got {other:?}"),
    }

    assert!(h.host.resume("core.player").await);
    bridge.open_window("Player", None).await.unwrap();
    assert_eq!(h.state("core.player").await, Some(RuntimeState::Running));
}

#[tokio::test(start_paused = true)]
async fn watchdog_crashes_silent_units() {
    let options = HostOptions::default()
        .with_heartbeat_interval(Duration::from_secs(1))
        .with_heartbeat_grace(Duration::from_secs(3));
    let mut h = harness(options);

    h.host
        .spawn(AppManifest::new("core.mute", SILENT), false)
        .await
        .unwrap();
    let _healthy = h.spawn_bridge("core.chatty", &[]).await;

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(h.state("core.mute").await, Some(RuntimeState::Crashed));
    assert_eq!(h.state("core.chatty").await, Some(RuntimeState::Running));

    let registry = h.host.registry();
    let registry = registry.read().await;
    assert_eq!(
        registry.get("core.mute").unwrap().error.as_deref(),
        Some("heartbeat timeout")
    );
}

#[tokio::test]
async fn shutdown_clears_every_instance() {
    let mut h = harness(HostOptions::default());
    h.spawn_bridge("core.a", &[]).await;
    h.spawn_bridge("core.b", &[]).await;

    let snapshots = h.host.instances().await;
    let ids: Vec<&str> = snapshots.iter().map(|s| s.app_id.as_str()).collect();
    assert_eq!(ids, ["core.a", "core.b"]);

    assert_eq!(h.host.shutdown().await, 2);
    assert_eq!(h.host.stats().await.total, 0);
}
