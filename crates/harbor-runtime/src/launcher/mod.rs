//! Execution unit launchers.
//!
//! A launcher turns a validated manifest into a running unit and hands the
//! host both ends it needs: a sender for envelopes to the unit and a
//! receiver of whatever the unit says (or how it failed).

mod in_process;
mod process;

pub use in_process::{InProcessLauncher, UnitProgram};
pub use process::ProcessLauncher;

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use harbor_capabilities::Capability;
use harbor_core::Pid;
use harbor_ipc::{ChannelEvent, Envelope};

use crate::error::LaunchError;
use crate::manifest::{AppManifest, RuntimeKind};

/// Everything a launcher needs to start one unit.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Application id.
    pub app_id: String,
    /// Pid allocated for this spawn.
    pub pid: Pid,
    /// The validated manifest.
    pub manifest: AppManifest,
    /// Capabilities the unit will be told about in `INIT`.
    pub granted: BTreeSet<Capability>,
    /// Capacity of the unit's channels.
    pub channel_capacity: usize,
}

/// Owner-side control over a launched unit.
pub trait UnitHandle: Send + Sync {
    /// Stop the unit and release its resources.
    ///
    /// # Errors
    ///
    /// Returns a description of what could not be released. Callers log it
    /// and carry on.
    fn dispose(&mut self) -> Result<(), String>;
}

/// The host's end of a unit: where to send envelopes, and how to stop it.
///
/// Owned by the registry entry of the instance.
pub struct UnitChannel {
    /// Envelopes to the unit.
    pub sender: mpsc::Sender<Envelope>,
    /// Control handle.
    pub handle: Box<dyn UnitHandle>,
}

impl UnitChannel {
    /// Pair a sender with its handle.
    #[must_use]
    pub fn new(sender: mpsc::Sender<Envelope>, handle: Box<dyn UnitHandle>) -> Self {
        Self { sender, handle }
    }

    /// Dispose the unit.
    ///
    /// # Errors
    ///
    /// See [`UnitHandle::dispose`].
    pub fn dispose(&mut self) -> Result<(), String> {
        self.handle.dispose()
    }
}

impl fmt::Debug for UnitChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitChannel")
            .field("closed", &self.sender.is_closed())
            .finish_non_exhaustive()
    }
}

/// A freshly launched unit.
#[derive(Debug)]
pub struct LaunchedUnit {
    /// The host's end, handed to the registry.
    pub channel: UnitChannel,
    /// Messages and faults from the unit, forwarded into the host loop.
    pub events: mpsc::Receiver<ChannelEvent>,
}

/// Instantiates execution units.
#[async_trait]
pub trait UnitLauncher: Send + Sync {
    /// Whether this launcher can run units of `kind`.
    fn supports(&self, kind: &RuntimeKind) -> bool;

    /// Start a unit.
    ///
    /// # Errors
    ///
    /// Returns a [`LaunchError`] if the unit could not be started.
    async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchedUnit, LaunchError>;
}
