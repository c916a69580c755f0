//! Prelude module - commonly used types for convenient import.
//!
//! Use `use harbor_runtime::prelude::*;` to import all essential types.

pub use crate::{
    AppManifest, DenyAllDispatcher, HostError, HostOptions, InProcessLauncher, IntentDispatcher,
    ProcessLauncher, RuntimeHost, RuntimeInstance, RuntimeKind, RuntimeRegistry, RuntimeStats,
    SpawnResult, SpawnSuccess, UnitLauncher,
};
