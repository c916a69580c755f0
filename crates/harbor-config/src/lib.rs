//! Layered configuration for the Harbor runtime host.
//!
//! # Usage
//!
//! ```rust,no_run
//! let config = harbor_config::Config::load(None).unwrap();
//! println!("intent timeout: {}ms", config.host.intent_timeout_ms);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. An explicitly named file (`harbor run --config path`)
//! 2. User (`<config dir>/harbor/config.toml`)
//! 3. Environment variables (`HARBOR_*`), fallback only
//! 4. Embedded defaults (`defaults.toml` compiled into the binary)
//!
//! This crate has no dependencies on other internal harbor crates.
//! Conversion into domain types happens where the host is assembled.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

use std::path::Path;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigSources;
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any layer is malformed or the merged
    /// configuration fails validation.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        loader::load(explicit)
    }

    /// Load configuration from explicit sources.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_from(sources: &ConfigSources) -> ConfigResult<Self> {
        loader::load_from(sources)
    }

    /// Validate this configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self) -> ConfigResult<()> {
        validate::validate(self)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
