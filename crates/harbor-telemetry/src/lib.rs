//! Harbor Telemetry - logging and trace context for the Harbor runtime host.
//!
//! This crate provides:
//! - [`setup_logging`], a `tracing-subscriber` stack with selectable format
//!   and target (including rotated log files)
//! - [`RequestContext`], which carries a trace id across the host, the
//!   dispatcher and the audit feed
//!
//! # Example
//!
//! ```rust,no_run
//! use harbor_telemetry::{LogConfig, LogFormat, RequestContext, setup_logging};
//!
//! # fn main() -> Result<(), harbor_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("harbor_runtime=debug");
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("host").with_app_id("core.files");
//! let _guard = ctx.span().entered();
//! tracing::info!("spawning");
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

mod context;
mod error;
mod logging;

pub use context::RequestContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging,
};
