//! Config file discovery and layered loading.
//!
//! Layers, lowest precedence first:
//! 1. Embedded `defaults.toml`
//! 2. `HARBOR_*` environment variables (fallbacks for anything no file sets)
//! 3. User config (`<config dir>/harbor/config.toml`)
//! 4. An explicitly named file
//!
//! The merged tree is deserialized into [`Config`] and validated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// How an environment variable's value is written into the tree.
#[derive(Clone, Copy)]
enum EnvKind {
    Integer,
    Text,
    Bool,
    List,
}

/// Environment variables and the config field each one feeds.
const ENV_FIELDS: &[(&str, &str, &str, EnvKind)] = &[
    ("HARBOR_INTENT_TIMEOUT_MS", "host", "intent_timeout_ms", EnvKind::Integer),
    ("HARBOR_HEARTBEAT_INTERVAL_MS", "host", "heartbeat_interval_ms", EnvKind::Integer),
    ("HARBOR_SPAWN_TIMEOUT_MS", "host", "spawn_timeout_ms", EnvKind::Integer),
    ("HARBOR_HEARTBEAT_GRACE_MS", "host", "heartbeat_grace_ms", EnvKind::Integer),
    ("HARBOR_CHANNEL_CAPACITY", "host", "channel_capacity", EnvKind::Integer),
    ("HARBOR_APPS_ROOT", "host", "apps_root", EnvKind::Text),
    ("HARBOR_FIRST_PARTY_PREFIXES", "trust", "first_party_prefixes", EnvKind::List),
    ("HARBOR_LOG_LEVEL", "logging", "level", EnvKind::Text),
    ("HARBOR_LOG_FORMAT", "logging", "format", EnvKind::Text),
    ("HARBOR_LOG_ANSI", "logging", "ansi", EnvKind::Bool),
];

/// Where configuration layers come from.
///
/// [`ConfigSources::discover`] fills this from the real environment; tests
/// build it by hand so they never touch process-global state.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Directory holding the user's `config.toml`.
    pub user_dir: Option<PathBuf>,
    /// An explicitly named config file. Missing is an error.
    pub explicit: Option<PathBuf>,
    /// Environment variables considered for fallbacks.
    pub env: HashMap<String, String>,
}

impl ConfigSources {
    /// Discover the user config directory and collect `HARBOR_*` variables.
    #[must_use]
    pub fn discover(explicit: Option<&Path>) -> Self {
        let user_dir = directories::ProjectDirs::from("", "", "harbor")
            .map(|dirs| dirs.config_dir().to_path_buf());
        let env = std::env::vars()
            .filter(|(key, _)| key.starts_with("HARBOR_"))
            .collect();
        Self {
            user_dir,
            explicit: explicit.map(Path::to_path_buf),
            env,
        }
    }
}

/// Load configuration from the real environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a file is unreadable or malformed, an
/// environment variable cannot be parsed, or the result fails validation.
pub fn load(explicit: Option<&Path>) -> ConfigResult<Config> {
    load_from(&ConfigSources::discover(explicit))
}

/// Load configuration from the given sources.
///
/// # Errors
///
/// See [`load`].
pub fn load_from(sources: &ConfigSources) -> ConfigResult<Config> {
    let mut merged = parse_toml(DEFAULTS_TOML, "<embedded defaults>")?;

    let env_overlay = env_overlay(&sources.env)?;
    if env_overlay.as_table().is_some_and(|t| !t.is_empty()) {
        debug!("applied environment variable fallbacks");
        deep_merge(&mut merged, &env_overlay);
    }

    if let Some(dir) = &sources.user_dir {
        let path = dir.join("config.toml");
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge(&mut merged, &overlay);
            info!(path = %path.display(), "loaded user config");
        }
    }

    if let Some(path) = &sources.explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        deep_merge(&mut merged, &overlay);
        info!(path = %path.display(), "loaded config file");
    }

    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source: e,
        })?;

    validate::validate(&config)?;
    Ok(config)
}

fn parse_toml(content: &str, path: &str) -> ConfigResult<toml::Value> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: path.to_owned(),
        source: e,
    })
}

/// Read a file, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    parse_toml(&content, &path.display().to_string()).map(Some)
}

fn env_overlay(env: &HashMap<String, String>) -> ConfigResult<toml::Value> {
    let mut root = toml::Table::new();

    for (var, section, field, kind) in ENV_FIELDS {
        let Some(raw) = env.get(*var) else {
            continue;
        };
        let raw = raw.trim();
        let value = match kind {
            EnvKind::Integer => raw
                .parse::<i64>()
                .map(toml::Value::Integer)
                .map_err(|e| env_error(var, &e))?,
            EnvKind::Bool => raw
                .parse::<bool>()
                .map(toml::Value::Boolean)
                .map_err(|e| env_error(var, &e))?,
            EnvKind::Text => toml::Value::String(raw.to_owned()),
            EnvKind::List => toml::Value::Array(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| toml::Value::String(s.to_owned()))
                    .collect(),
            ),
        };

        if let toml::Value::Table(table) = root
            .entry((*section).to_owned())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
        {
            table.insert((*field).to_owned(), value);
        }
    }

    Ok(toml::Value::Table(root))
}

fn env_error(var: &str, e: &dyn std::fmt::Display) -> ConfigError {
    ConfigError::EnvError {
        var_name: var.to_owned(),
        message: e.to_string(),
    }
}

/// Recursively merge `overlay` into `base`. Tables merge per key; scalars
/// and arrays replace.
fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_deserialize_to_default_config() {
        let value = parse_toml(DEFAULTS_TOML, "defaults").unwrap();
        let config: Config = value.try_into().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_with_no_layers_is_the_default() {
        let config = load_from(&ConfigSources::default()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.host.intent_timeout(), Duration::from_secs(30));
        assert!(config.host.heartbeat_grace().is_none());
    }

    #[test]
    fn user_file_overrides_defaults_field_by_field() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "config.toml",
            "[host]\nspawn_timeout_ms = 2500\n[logging]\nlevel = \"debug\"\n",
        );

        let config = load_from(&ConfigSources {
            user_dir: Some(dir.path().to_path_buf()),
            ..ConfigSources::default()
        })
        .unwrap();

        assert_eq!(config.host.spawn_timeout_ms, 2500);
        assert_eq!(config.host.intent_timeout_ms, 30_000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "compact");
    }

    #[test]
    fn explicit_file_beats_user_file_and_env() {
        let user = tempfile::tempdir().unwrap();
        write(user.path(), "config.toml", "[host]\nchannel_capacity = 8\n");
        let other = tempfile::tempdir().unwrap();
        let explicit = write(other.path(), "harbor.toml", "[host]\nchannel_capacity = 16\n");

        let mut env = HashMap::new();
        env.insert("HARBOR_CHANNEL_CAPACITY".to_owned(), "4".to_owned());
        env.insert("HARBOR_LOG_FORMAT".to_owned(), "json".to_owned());

        let config = load_from(&ConfigSources {
            user_dir: Some(user.path().to_path_buf()),
            explicit: Some(explicit),
            env,
        })
        .unwrap();

        assert_eq!(config.host.channel_capacity, 16);
        // Nothing in a file sets the format, so the env fallback applies.
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn env_list_and_integer_fallbacks() {
        let mut env = HashMap::new();
        env.insert(
            "HARBOR_FIRST_PARTY_PREFIXES".to_owned(),
            "core., system. ,".to_owned(),
        );
        env.insert("HARBOR_HEARTBEAT_GRACE_MS".to_owned(), "45000".to_owned());

        let config = load_from(&ConfigSources {
            env,
            ..ConfigSources::default()
        })
        .unwrap();

        assert_eq!(config.trust.first_party_prefixes, vec!["core.", "system."]);
        assert_eq!(config.host.heartbeat_grace_ms, Some(45_000));
    }

    #[test]
    fn malformed_env_is_an_error() {
        let mut env = HashMap::new();
        env.insert("HARBOR_SPAWN_TIMEOUT_MS".to_owned(), "soon".to_owned());
        let err = load_from(&ConfigSources {
            env,
            ..ConfigSources::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::EnvError { ref var_name, .. } if var_name == "HARBOR_SPAWN_TIMEOUT_MS"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_from(&ConfigSources {
            explicit: Some(PathBuf::from("/nonexistent/harbor.toml")),
            ..ConfigSources::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.toml", "[host\n");
        let err = load_from(&ConfigSources {
            explicit: Some(path),
            ..ConfigSources::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn merged_result_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "harbor.toml",
            "[host]\nintent_timeout_ms = 5000\nheartbeat_interval_ms = 6000\n",
        );
        let err = load_from(&ConfigSources {
            explicit: Some(path),
            ..ConfigSources::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "host.heartbeat_interval_ms"));
    }

    #[test]
    fn missing_user_file_is_skipped() {
        assert!(try_load_file(Path::new("/nonexistent/config.toml")).unwrap().is_none());
    }
}
