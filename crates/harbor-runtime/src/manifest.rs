//! Application manifests.
//!
//! A manifest declares what an application is, how to run it and which
//! capabilities it would like. Requested capabilities stay raw strings so
//! names outside the vocabulary can be expressed (and denied) instead of
//! failing to parse.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};

/// How an application's entry is executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuntimeKind {
    /// A child process speaking newline-delimited JSON on stdio.
    Process,
    /// A WebAssembly module. Recognized but not spawnable.
    Wasm,
    /// A runtime name this host does not know.
    Unknown(String),
}

impl RuntimeKind {
    /// Wire name of the runtime.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Process => "process",
            Self::Wasm => "wasm",
            Self::Unknown(name) => name,
        }
    }

    /// Whether the name is one this host recognizes.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Whether units of this kind can be spawned.
    #[must_use]
    pub fn is_spawnable(&self) -> bool {
        matches!(self, Self::Process)
    }
}

impl From<String> for RuntimeKind {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "process" => Self::Process,
            "wasm" => Self::Wasm,
            _ => Self::Unknown(name),
        }
    }
}

impl From<RuntimeKind> for String {
    fn from(kind: RuntimeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window hints for applications with a UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowHints {
    /// Preferred width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Preferred height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Window title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whether the window may be resized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resizable: Option<bool>,
}

/// Integrity metadata of the application bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    /// Content hash of the bundle.
    pub hash: String,
    /// Detached signature over the hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// An application manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppManifest {
    /// Unique application id, e.g. `core.files` or `com.example.notes`.
    pub app_id: String,
    /// Display name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Entry point, relative to the application directory.
    pub entry: String,
    /// How the entry is executed.
    pub runtime: RuntimeKind,
    /// Capability names the application asks for.
    #[serde(default)]
    pub requested_capabilities: Vec<String>,
    /// Window hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowHints>,
    /// Bundle integrity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<Integrity>,
}

impl AppManifest {
    /// A process manifest with no requested capabilities.
    #[must_use]
    pub fn new(app_id: impl Into<String>, entry: impl Into<String>) -> Self {
        let app_id = app_id.into();
        Self {
            name: app_id.clone(),
            app_id,
            version: "0.1.0".to_string(),
            entry: entry.into(),
            runtime: RuntimeKind::Process,
            requested_capabilities: Vec::new(),
            window: None,
            integrity: None,
        }
    }

    /// Set the requested capabilities.
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Set the runtime kind.
    #[must_use]
    pub fn with_runtime(mut self, runtime: RuntimeKind) -> Self {
        self.runtime = runtime;
        self
    }

    /// Parse a JSON manifest.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ManifestParse`] on malformed input.
    pub fn from_json_str(input: &str) -> RuntimeResult<Self> {
        serde_json::from_str(input).map_err(|e| inline_parse_error(e.to_string()))
    }

    /// Parse a TOML manifest. Keys use the same camelCase names as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ManifestParse`] on malformed input.
    pub fn from_toml_str(input: &str) -> RuntimeResult<Self> {
        toml::from_str(input).map_err(|e| inline_parse_error(e.to_string()))
    }

    /// Load a manifest from disk. Files ending in `.toml` are read as TOML,
    /// everything else as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RuntimeError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let parsed = if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        };

        parsed.map_err(|e| match e {
            RuntimeError::ManifestParse { message, .. } => RuntimeError::ManifestParse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }
}

fn inline_parse_error(message: String) -> RuntimeError {
    RuntimeError::ManifestParse {
        path: PathBuf::from("<inline>"),
        message,
    }
}
