//! Prelude module - commonly used types for convenient import.
//!
//! Use `use harbor_core::prelude::*;` to import all essential types.

pub use crate::{Decision, DecisionOutcome, ErrorCode, Pid, PidAllocator, RuntimeState};
