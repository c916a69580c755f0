//! Child-process units speaking newline-delimited JSON over stdio.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use harbor_ipc::{ChannelEvent, Envelope, MAX_LINE_BYTES, decode_line, encode_line};

use super::{LaunchSpec, LaunchedUnit, UnitChannel, UnitHandle, UnitLauncher};
use crate::error::LaunchError;
use crate::manifest::RuntimeKind;

/// Launches `process` units as child processes.
///
/// The entry is resolved inside the apps root (symlinks included) and run
/// with the apps root as working directory, a cleared environment and
/// `kill_on_drop`. Stdin carries envelopes to the unit, stdout carries the
/// unit's messages, stderr is inherited so unit logs reach the host's
/// terminal. A stdout line longer than [`MAX_LINE_BYTES`] kills the unit
/// and is reported as a fault.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    apps_root: PathBuf,
}

impl ProcessLauncher {
    /// Create a launcher rooted at `apps_root`.
    #[must_use]
    pub fn new(apps_root: impl Into<PathBuf>) -> Self {
        Self {
            apps_root: apps_root.into(),
        }
    }

    /// The apps root.
    #[must_use]
    pub fn apps_root(&self) -> &Path {
        &self.apps_root
    }

    async fn resolve_entry(&self, entry: &str) -> Result<PathBuf, LaunchError> {
        let root = tokio::fs::canonicalize(&self.apps_root).await?;
        let program = tokio::fs::canonicalize(root.join(entry)).await?;
        if !program.starts_with(&root) {
            return Err(LaunchError::EntryOutsideRoot {
                entry: entry.to_string(),
                root,
            });
        }
        Ok(program)
    }
}

#[async_trait]
impl UnitLauncher for ProcessLauncher {
    fn supports(&self, kind: &RuntimeKind) -> bool {
        matches!(kind, RuntimeKind::Process)
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchedUnit, LaunchError> {
        if !self.supports(&spec.manifest.runtime) {
            return Err(LaunchError::UnsupportedRuntime(
                spec.manifest.runtime.to_string(),
            ));
        }

        let program = self.resolve_entry(&spec.manifest.entry).await?;

        let mut cmd = Command::new(&program);
        cmd.current_dir(&self.apps_root)
            .env_clear()
            .env("HARBOR_APP_ID", &spec.app_id)
            .env("HARBOR_PID", spec.pid.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }

        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LaunchError::Other("unit stdin was not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LaunchError::Other("unit stdout was not captured".into()))?;

        let (to_unit, from_host) = mpsc::channel(spec.channel_capacity.max(1));
        let (events_tx, events_rx) = mpsc::channel(spec.channel_capacity.max(1));
        let (kill_tx, kill_rx) = oneshot::channel();

        tokio::spawn(write_envelopes(stdin, from_host, spec.app_id.clone()));
        tokio::spawn(supervise(child, stdout, events_tx, kill_rx, spec.app_id.clone()));

        info!(
            app_id = %spec.app_id,
            pid = %spec.pid,
            program = %program.display(),
            "Started unit process"
        );

        Ok(LaunchedUnit {
            channel: UnitChannel::new(
                to_unit,
                Box::new(ProcessHandle {
                    kill: Some(kill_tx),
                }),
            ),
            events: events_rx,
        })
    }
}

struct ProcessHandle {
    kill: Option<oneshot::Sender<()>>,
}

impl UnitHandle for ProcessHandle {
    fn dispose(&mut self) -> Result<(), String> {
        if let Some(kill) = self.kill.take()
            && kill.send(()).is_err()
        {
            debug!("Unit process had already exited");
        }
        Ok(())
    }
}

async fn write_envelopes(
    mut stdin: ChildStdin,
    mut from_host: mpsc::Receiver<Envelope>,
    app_id: String,
) {
    while let Some(envelope) = from_host.recv().await {
        let line = match encode_line(&envelope) {
            Ok(line) => line,
            Err(e) => {
                warn!(app_id = %app_id, error = %e, "Failed to encode envelope");
                continue;
            },
        };
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            debug!(app_id = %app_id, error = %e, "Unit stdin closed");
            return;
        }
        if let Err(e) = stdin.flush().await {
            debug!(app_id = %app_id, error = %e, "Unit stdin closed");
            return;
        }
    }
}

async fn supervise(
    mut child: Child,
    stdout: ChildStdout,
    events: mpsc::Sender<ChannelEvent>,
    mut kill: oneshot::Receiver<()>,
    app_id: String,
) {
    let mut lines = FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    loop {
        tokio::select! {
            _ = &mut kill => {
                stop(&mut child, &app_id).await;
                return;
            },
            line = lines.next() => match line {
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match decode_line(&line) {
                        Ok(value) => {
                            if events.send(ChannelEvent::Message(value)).await.is_err() {
                                // Nobody is listening any more.
                                stop(&mut child, &app_id).await;
                                return;
                            }
                        },
                        Err(e) => {
                            warn!(app_id = %app_id, error = %e, "Dropping unreadable line from unit");
                        },
                    }
                },
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    let fault = format!("unit wrote a line longer than {MAX_LINE_BYTES} bytes");
                    warn!(app_id = %app_id, fault = %fault, "Unit output rejected");
                    stop(&mut child, &app_id).await;
                    let _ = events.send(ChannelEvent::Fault(fault)).await;
                    return;
                },
                Some(Err(LinesCodecError::Io(e))) => {
                    warn!(app_id = %app_id, error = %e, "Failed to read unit output");
                    break;
                },
                None => break,
            },
        }
    }

    let status = tokio::select! {
        _ = &mut kill => {
            stop(&mut child, &app_id).await;
            return;
        },
        status = child.wait() => status,
    };

    let fault = match status {
        Ok(status) if status.success() => {
            debug!(app_id = %app_id, "Unit process exited");
            return;
        },
        Ok(status) => format!("unit exited with {status}"),
        Err(e) => format!("failed to wait for unit: {e}"),
    };
    warn!(app_id = %app_id, fault = %fault, "Unit process failed");
    let _ = events.send(ChannelEvent::Fault(fault)).await;
}

async fn stop(child: &mut Child, app_id: &str) {
    match child.kill().await {
        Ok(()) => debug!(app_id, "Unit process killed"),
        Err(e) => warn!(app_id, error = %e, "Failed to kill unit process"),
    }
}
