//! Prelude module - commonly used types for convenient import.
//!
//! Use `use harbor_ipc::prelude::*;` to import all essential types.

pub use crate::{
    ChannelEvent, Envelope, Intent, IntentOutcome, IntentRequest, IntentSpec, IpcError,
    IpcResult, MessageType, PendingRequests, UnitPort,
};
