//! Harbor SDK - the bridge an application unit uses to talk to its host.
//!
//! A unit owns no privileges. It waits for `INIT`, learns which
//! capabilities it was granted and asks the host to act on its behalf with
//! intents. [`Bridge`] does the bookkeeping: it answers `INIT` with
//! `READY`, heartbeats, correlates every intent with its response and
//! refuses locally what was never granted.
//!
//! # Example
//!
//! ```rust,no_run
//! use harbor_sdk::prelude::*;
//!
//! # async fn example() -> BridgeResult<()> {
//! let bridge = Bridge::stdio();
//! bridge.ready().await?;
//!
//! if bridge.has_capability(Capability::Notify) {
//!     bridge.notify("Hello", Some("from a unit")).await?;
//! }
//! bridge.closed().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bridge;
mod error;
mod stdio;

pub use bridge::Bridge;
pub use error::{BridgeError, BridgeResult};
