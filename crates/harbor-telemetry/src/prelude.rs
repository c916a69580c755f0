//! Prelude module - commonly used types for convenient import.
//!
//! Use `use harbor_telemetry::prelude::*;` to import all essential types.

pub use crate::{LogConfig, LogFormat, LogTarget, RequestContext, TelemetryError, setup_logging};
