//! Harbor IPC - the message protocol between the runtime host and its units.
//!
//! This crate provides:
//! - [`Envelope`], the JSON wire shape of every message, and its structural
//!   validation
//! - The typed [`Intent`] vocabulary and its capability mapping
//! - [`PendingRequests`], a correlation table that pairs requests with their
//!   responses under a bounded timeout
//! - Channel primitives shared by launchers and the in-unit bridge
//!
//! Nothing here holds policy. Deciding whether an intent is allowed is the
//! host's job; this crate only guarantees that what reaches the host is
//! well-formed.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod envelope;
mod error;
mod intent;
mod pending;
mod transport;

pub use envelope::{Envelope, InitPayload, MessageType};
pub use error::{IpcError, IpcResult};
pub use intent::{Intent, IntentOutcome, IntentRequest, IntentSpec};
pub use pending::{DEFAULT_INTENT_TIMEOUT, PendingRequests, PendingResponse};
pub use transport::{
    ChannelEvent, MAX_LINE_BYTES, UnitPort, decode_line, encode_line, unit_channel,
};
