//! Prelude module - commonly used types for convenient import.
//!
//! Use `use harbor_config::prelude::*;` to import all essential types.

pub use crate::{
    Config, ConfigError, ConfigResult, ConfigSources, HostSection, LoggingSection, TrustSection,
};
