//! Harbor Core - shared types for the Harbor runtime host.
//!
//! This crate provides:
//! - Opaque process identifiers and correlation id generators
//! - The runtime lifecycle state machine
//! - The tagged error codes surfaced to callers and units
//! - Allow/deny decisions attached to intent responses
//!
//! It has no dependencies on other internal harbor crates.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod decision;
mod error_code;
mod ids;
mod state;

pub use decision::{Decision, DecisionOutcome};
pub use error_code::ErrorCode;
pub use ids::{Pid, PidAllocator, new_op_id, new_request_id, new_trace_id};
pub use state::RuntimeState;
