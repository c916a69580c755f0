//! Units that run as tokio tasks inside the host process.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use harbor_ipc::{ChannelEvent, UnitPort, unit_channel};

use super::{LaunchSpec, LaunchedUnit, UnitChannel, UnitHandle, UnitLauncher};
use crate::error::LaunchError;
use crate::manifest::RuntimeKind;

/// The body of an in-process unit.
///
/// Implemented for any `Fn(UnitPort) -> impl Future<Output = ()>`, so a
/// closure that builds a bridge over the port is enough.
#[async_trait]
pub trait UnitProgram: Send + Sync {
    /// Run the unit until it finishes or is aborted.
    async fn run(&self, port: UnitPort);
}

#[async_trait]
impl<F, Fut> UnitProgram for F
where
    F: Fn(UnitPort) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn run(&self, port: UnitPort) {
        (self)(port).await;
    }
}

/// Runs registered [`UnitProgram`]s as tasks, keyed by manifest entry.
///
/// Serves `process` manifests, which makes it a drop-in stand-in for
/// [`ProcessLauncher`](super::ProcessLauncher) in tests and embedded
/// setups. A panicking program is reported to the host as a fault.
#[derive(Clone, Default)]
pub struct InProcessLauncher {
    programs: HashMap<String, Arc<dyn UnitProgram>>,
}

impl InProcessLauncher {
    /// Create a launcher with no programs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `program` under `entry`.
    #[must_use]
    pub fn with_program(
        mut self,
        entry: impl Into<String>,
        program: impl UnitProgram + 'static,
    ) -> Self {
        self.register(entry, program);
        self
    }

    /// Register `program` under `entry`, replacing any previous one.
    pub fn register(&mut self, entry: impl Into<String>, program: impl UnitProgram + 'static) {
        self.programs.insert(entry.into(), Arc::new(program));
    }

    /// Whether a program is registered under `entry`.
    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        self.programs.contains_key(entry)
    }
}

impl fmt::Debug for InProcessLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<&String> = self.programs.keys().collect();
        entries.sort();
        f.debug_struct("InProcessLauncher")
            .field("entries", &entries)
            .finish()
    }
}

#[async_trait]
impl UnitLauncher for InProcessLauncher {
    fn supports(&self, kind: &RuntimeKind) -> bool {
        matches!(kind, RuntimeKind::Process)
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchedUnit, LaunchError> {
        let program = self
            .programs
            .get(&spec.manifest.entry)
            .map(Arc::clone)
            .ok_or_else(|| LaunchError::ProgramNotFound(spec.manifest.entry.clone()))?;

        let (sender, events, port) = unit_channel(spec.channel_capacity);
        let faults = port.outbound.clone();

        let task = tokio::spawn(async move { program.run(port).await });
        let abort = task.abort_handle();

        let app_id = spec.app_id.clone();
        tokio::spawn(async move {
            match task.await {
                Ok(()) => debug!(app_id = %app_id, "In-process unit finished"),
                Err(e) if e.is_panic() => {
                    warn!(app_id = %app_id, "In-process unit panicked");
                    let _ = faults
                        .send(ChannelEvent::Fault("unit panicked".into()))
                        .await;
                },
                Err(_) => debug!(app_id = %app_id, "In-process unit aborted"),
            }
        });

        debug!(
            app_id = %spec.app_id,
            pid = %spec.pid,
            entry = %spec.manifest.entry,
            "Started in-process unit"
        );

        Ok(LaunchedUnit {
            channel: UnitChannel::new(sender, Box::new(TaskHandle { abort })),
            events,
        })
    }
}

struct TaskHandle {
    abort: AbortHandle,
}

impl UnitHandle for TaskHandle {
    fn dispose(&mut self) -> Result<(), String> {
        self.abort.abort();
        Ok(())
    }
}
