//! Harbor Runtime - the host that spawns, isolates and supervises app units.
//!
//! This crate provides:
//! - [`AppManifest`] loading and validation
//! - The [`RuntimeRegistry`] of live instances and their lifecycle
//! - [`UnitLauncher`]s that start units as child processes or in-process
//!   tasks
//! - [`RuntimeHost`], which grants capabilities at spawn, speaks the
//!   envelope protocol with every unit and gates each intent on its grant
//!   before handing it to an [`IntentDispatcher`]
//!
//! # Architecture
//!
//! Units never touch host resources. Everything privileged is an intent
//! sent over the unit's channel; the host loop checks the intent against
//! the capabilities granted at spawn, applies per-capability rate limits
//! and only then dispatches it. Host-only message types arriving from a
//! unit are refused and reported.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use harbor_events::EventBus;
//! use harbor_runtime::prelude::*;
//!
//! # async fn example() {
//! let host = RuntimeHost::start(
//!     HostOptions::default(),
//!     Arc::new(ProcessLauncher::new("/srv/harbor/apps")),
//!     Arc::new(DenyAllDispatcher),
//!     EventBus::new(),
//! );
//!
//! let manifest = AppManifest::new("core.files", "files/run.sh")
//!     .with_capabilities(["fs.read", "ui.notify"]);
//! match host.spawn(manifest, false).await {
//!     Ok(spawned) => println!("{} is {}", spawned.app_id, spawned.pid),
//!     Err(e) => eprintln!("spawn failed: {e}"),
//! }
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod launcher;
pub mod prelude;

mod dispatcher;
mod error;
mod host;
mod instance;
mod manifest;
mod registry;
mod validate;

pub use dispatcher::{DenyAllDispatcher, IntentDispatcher};
pub use error::{HostError, LaunchError, RuntimeError, RuntimeResult};
pub use host::{HostOptions, RuntimeHost, SpawnResult, SpawnSuccess};
pub use instance::{InstanceSnapshot, RuntimeInstance, RuntimeStats};
pub use launcher::{
    InProcessLauncher, LaunchSpec, LaunchedUnit, ProcessLauncher, UnitChannel, UnitHandle,
    UnitLauncher, UnitProgram,
};
pub use manifest::{AppManifest, Integrity, RuntimeKind, WindowHints};
pub use registry::RuntimeRegistry;
pub use validate::{InvalidManifest, validate_manifest};
