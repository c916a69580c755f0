//! Bridge from `harbor_config::Config` to the host and logging types.

use harbor_capabilities::{PolicyTable, TrustClassifier};
use harbor_config::Config;
use harbor_runtime::HostOptions;
use harbor_telemetry::{LogConfig, LogFormat};

/// Host options from the `[host]` and `[trust]` sections, with the builtin
/// policy table.
pub(crate) fn host_options(config: &Config) -> HostOptions {
    let host = &config.host;
    HostOptions {
        intent_timeout: host.intent_timeout(),
        heartbeat_interval: host.heartbeat_interval(),
        spawn_timeout: host.spawn_timeout(),
        heartbeat_grace: host.heartbeat_grace(),
        watchdog_interval: host.watchdog_interval(),
        channel_capacity: host.channel_capacity,
        trust: TrustClassifier::new(config.trust.first_party_prefixes.iter().cloned()),
        policies: PolicyTable::builtin(),
    }
}

/// Logging setup for the CLI.
///
/// Uses the `[logging]` section when the config loaded and converts, falls
/// back to compact `info` otherwise. `verbose` forces `debug`.
pub(crate) fn log_config(config: Option<&Config>, verbose: bool) -> LogConfig {
    let mut log_config = config
        .and_then(|config| LogConfig::try_from(&config.logging).ok())
        .unwrap_or_else(|| LogConfig::new("info").with_format(LogFormat::Compact));
    if verbose {
        log_config.level = "debug".to_string();
    }
    log_config
}
