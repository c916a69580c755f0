//! Prelude module - commonly used types for convenient import.
//!
//! Use `use harbor_capabilities::prelude::*;` to import all essential types.

pub use crate::{
    Capability, CapabilityPolicy, DenialReason, GrantOutcome, PolicyTable, RateLimit,
    TrustClassifier, TrustLevel, grant,
};
