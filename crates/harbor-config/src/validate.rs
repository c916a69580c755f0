//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_host(config)?;
    validate_trust(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_host(config: &Config) -> ConfigResult<()> {
    let h = &config.host;

    for (field, value) in [
        ("host.intent_timeout_ms", h.intent_timeout_ms),
        ("host.heartbeat_interval_ms", h.heartbeat_interval_ms),
        ("host.spawn_timeout_ms", h.spawn_timeout_ms),
        ("host.watchdog_interval_ms", h.watchdog_interval_ms),
    ] {
        if value == 0 {
            return Err(invalid(field, "must be greater than zero"));
        }
    }

    if h.channel_capacity == 0 {
        return Err(invalid("host.channel_capacity", "must be greater than zero"));
    }

    if h.heartbeat_interval_ms >= h.intent_timeout_ms {
        return Err(invalid(
            "host.heartbeat_interval_ms",
            format!(
                "heartbeat interval ({}ms) must be shorter than the intent timeout ({}ms)",
                h.heartbeat_interval_ms, h.intent_timeout_ms
            ),
        ));
    }

    if let Some(grace) = h.heartbeat_grace_ms
        && grace <= h.heartbeat_interval_ms
    {
        return Err(invalid(
            "host.heartbeat_grace_ms",
            format!(
                "grace period ({grace}ms) must exceed the heartbeat interval ({}ms)",
                h.heartbeat_interval_ms
            ),
        ));
    }

    Ok(())
}

fn validate_trust(config: &Config) -> ConfigResult<()> {
    let prefixes = &config.trust.first_party_prefixes;
    if prefixes.is_empty() {
        return Err(invalid(
            "trust.first_party_prefixes",
            "at least one first-party prefix is required",
        ));
    }
    if prefixes.iter().any(|p| p.trim().is_empty()) {
        return Err(invalid(
            "trust.first_party_prefixes",
            "prefixes must not be empty",
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    Ok(())
}
