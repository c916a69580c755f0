//! `harbor run`: spawn one app and supervise it in the foreground.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use harbor_config::Config;
use harbor_core::RuntimeState;
use harbor_events::{EventBus, RuntimeEvent};
use harbor_ipc::{Intent, IntentOutcome, IntentRequest};
use harbor_runtime::{AppManifest, IntentDispatcher, ProcessLauncher, RuntimeHost};

use crate::config_bridge;
use crate::theme::Theme;

/// Dispatcher for foreground runs: notifications are printed to the
/// terminal, everything else has no handler here and is denied.
#[derive(Debug, Default)]
pub(crate) struct ConsoleDispatcher;

#[async_trait]
impl IntentDispatcher for ConsoleDispatcher {
    async fn dispatch(&self, request: IntentRequest) -> IntentOutcome {
        info!(
            app_id = %request.app_id,
            action = request.intent.action(),
            trace_id = %request.trace_id,
            "Intent"
        );
        match &request.intent {
            Intent::Notify { title, body } => {
                let line = match body {
                    Some(body) => format!("[{}] {title}: {body}", request.app_id),
                    None => format!("[{}] {title}", request.app_id),
                };
                println!("{}", Theme::info(&line));
                IntentOutcome::ok(&request, Some(json!({ "delivered": true })))
            },
            other => {
                let reason = format!("{} is not available from the CLI", other.action());
                IntentOutcome::denied(&request, reason)
            },
        }
    }
}

/// Spawn the app, print its lifecycle, and stop when it reaches a
/// terminal state or on Ctrl+C.
pub(crate) async fn run_app(
    path: &Path,
    config_path: Option<&Path>,
    is_admin: bool,
    apps_root: Option<PathBuf>,
) -> Result<()> {
    let config = Config::load(config_path).context("failed to load configuration")?;
    let manifest = AppManifest::load(path)?;
    let apps_root = apps_root.unwrap_or_else(|| config.host.apps_root.clone());

    let events = EventBus::new();
    let mut app_events = events.subscribe_app(manifest.app_id.clone());
    let host = RuntimeHost::start(
        config_bridge::host_options(&config),
        Arc::new(ProcessLauncher::new(&apps_root)),
        Arc::new(ConsoleDispatcher),
        events,
    );

    println!(
        "{}",
        Theme::header(&format!("Spawning {} from {}", manifest.app_id, apps_root.display()))
    );
    let app_id = manifest.app_id.clone();
    let spawned = match host.spawn(manifest, is_admin).await {
        Ok(spawned) => spawned,
        Err(e) => {
            println!("{}", Theme::error(&e.to_string()));
            host.shutdown().await;
            bail!(e);
        },
    };

    println!("{}", Theme::success(&format!("{} running as {}", app_id, spawned.pid)));
    for capability in &spawned.granted {
        println!("  {}", Theme::kv("granted", capability.as_str()));
    }
    for (name, reason) in &spawned.denied {
        println!("  {}", Theme::warning(&format!("denied {name}: {reason}")));
    }
    println!("{}", Theme::dimmed("Press Ctrl+C to stop"));
    println!("{}", Theme::separator());

    let final_state = loop {
        tokio::select! {
            event = app_events.recv() => {
                let Some(event) = event else { break None };
                if let Some(state) = report(&event) {
                    println!("  {}", Theme::stats(&host.stats().await));
                    if state.is_terminal() {
                        break Some(state);
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", Theme::info("Stopping"));
                host.terminate(&app_id).await;
                break Some(RuntimeState::Terminated);
            },
        }
    };

    let removed = host.shutdown().await;
    info!(removed, "Host stopped");

    if final_state == Some(RuntimeState::Crashed) {
        bail!("{app_id} crashed");
    }
    Ok(())
}

/// Print a lifecycle event. Returns the new state for state changes.
fn report(event: &RuntimeEvent) -> Option<RuntimeState> {
    match event {
        RuntimeEvent::StateChanged {
            from, to, error, ..
        } => {
            let line = format!("{} -> {}", Theme::state(*from), Theme::state(*to));
            match error {
                Some(error) => println!("{} {}", line, Theme::dimmed(error)),
                None => println!("{line}"),
            }
            Some(*to)
        },
        RuntimeEvent::IntentDecision {
            action, decision, ..
        } if !decision.is_allowed() => {
            let reason = decision.reason.as_deref().unwrap_or("denied");
            println!("{}", Theme::warning(&format!("{action}: {reason}")));
            None
        },
        RuntimeEvent::DirectApiBlocked { message_type, .. } => {
            println!(
                "{}",
                Theme::warning(&format!("blocked host-only message {message_type}"))
            );
            None
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use harbor_capabilities::Capability;
    use harbor_core::{Decision, Pid};
    use harbor_events::EventMetadata;

    use super::*;

    fn request(intent: Intent) -> IntentRequest {
        IntentRequest {
            request_id: "r-1".into(),
            app_id: "core.hello".into(),
            pid: Pid::new("rt-core.hello-1"),
            trace_id: "t-1".into(),
            op_id: None,
            capability: intent.capability(),
            intent,
        }
    }

    #[tokio::test]
    async fn console_delivers_notifications() {
        let outcome = ConsoleDispatcher
            .dispatch(request(Intent::Notify {
                title: "hi".into(),
                body: Some("there".into()),
            }))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.data, Some(json!({ "delivered": true })));
    }

    #[tokio::test]
    async fn console_denies_everything_else() {
        let outcome = ConsoleDispatcher
            .dispatch(request(Intent::ReadFile {
                path: "/etc/hosts".into(),
            }))
            .await;
        assert!(!outcome.success);
        assert!(outcome.decision.is_some_and(|d| !d.is_allowed()));
        assert_eq!(Capability::FsRead, Intent::ReadFile { path: String::new() }.capability());
    }

    #[test]
    fn report_returns_new_state() {
        let event = RuntimeEvent::StateChanged {
            metadata: EventMetadata::new("test"),
            app_id: "core.hello".into(),
            pid: Pid::new("rt-core.hello-1"),
            from: RuntimeState::Running,
            to: RuntimeState::Crashed,
            error: Some("boom".into()),
            crash_count: 1,
        };
        assert_eq!(report(&event), Some(RuntimeState::Crashed));

        let decision = RuntimeEvent::IntentDecision {
            metadata: EventMetadata::new("test"),
            app_id: "core.hello".into(),
            action: "fs.read".into(),
            capability: "fs.read".into(),
            decision: Decision::deny("capability fs.read not granted"),
        };
        assert_eq!(report(&decision), None);
    }
}
