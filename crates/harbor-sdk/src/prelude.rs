//! Prelude module - commonly used types for convenient import.
//!
//! Use `use harbor_sdk::prelude::*;` to import all essential types.

pub use crate::{Bridge, BridgeError, BridgeResult};
pub use harbor_capabilities::Capability;
pub use harbor_ipc::Intent;
