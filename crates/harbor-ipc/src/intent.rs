//! Typed intents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use harbor_capabilities::Capability;
use harbor_core::{Decision, Pid};

use crate::error::{IpcError, IpcResult};

/// The raw intent carried on an `INTENT_REQUEST`: an action, the capability
/// the unit claims it needs and free-form parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSpec {
    /// Action name, e.g. `fs.read`.
    pub action: String,
    /// Capability the unit declares for the action.
    pub capability: String,
    /// Action parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

impl IntentSpec {
    /// Create a spec.
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        capability: impl Into<String>,
        params: Option<Value>,
    ) -> Self {
        Self {
            action: action.into(),
            capability: capability.into(),
            params,
        }
    }
}

/// A privileged operation a unit may ask the host to perform.
///
/// Each action maps to exactly one [`Capability`] via
/// [`Intent::capability`]; the match is exhaustive so a new action cannot
/// be added without deciding what it requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params")]
pub enum Intent {
    /// Read a file.
    #[serde(rename = "fs.read")]
    ReadFile {
        /// Path to read.
        path: String,
    },
    /// Write a file.
    #[serde(rename = "fs.write")]
    WriteFile {
        /// Path to write.
        path: String,
        /// New contents.
        contents: String,
    },
    /// Read a scratch value.
    #[serde(rename = "fs.temp.get")]
    TempGet {
        /// Key to read.
        key: String,
    },
    /// Store a scratch value.
    #[serde(rename = "fs.temp.put")]
    TempPut {
        /// Key to write.
        key: String,
        /// Value to store.
        value: Value,
    },
    /// Spawn a host process.
    #[serde(rename = "process.spawn")]
    SpawnProcess {
        /// Program to run.
        command: String,
        /// Arguments.
        #[serde(default)]
        args: Vec<String>,
    },
    /// Perform a network request.
    #[serde(rename = "net.fetch")]
    Fetch {
        /// Target URL.
        url: String,
        /// HTTP method, `GET` when absent.
        #[serde(default)]
        method: Option<String>,
        /// Request headers.
        #[serde(default)]
        headers: BTreeMap<String, String>,
        /// Request body.
        #[serde(default)]
        body: Option<String>,
    },
    /// Open a shell window.
    #[serde(rename = "ui.window.open")]
    OpenWindow {
        /// Window title.
        title: String,
        /// Content to show.
        #[serde(default)]
        url: Option<String>,
        /// Requested width.
        #[serde(default)]
        width: Option<u32>,
        /// Requested height.
        #[serde(default)]
        height: Option<u32>,
    },
    /// Post a notification.
    #[serde(rename = "ui.notify")]
    Notify {
        /// Notification title.
        title: String,
        /// Notification body.
        #[serde(default)]
        body: Option<String>,
    },
    /// Read audit log entries.
    #[serde(rename = "audit.read")]
    ReadAuditLog {
        /// Maximum number of entries.
        #[serde(default)]
        limit: Option<u32>,
    },
}

impl Intent {
    /// Action name on the wire.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "fs.read",
            Self::WriteFile { .. } => "fs.write",
            Self::TempGet { .. } => "fs.temp.get",
            Self::TempPut { .. } => "fs.temp.put",
            Self::SpawnProcess { .. } => "process.spawn",
            Self::Fetch { .. } => "net.fetch",
            Self::OpenWindow { .. } => "ui.window.open",
            Self::Notify { .. } => "ui.notify",
            Self::ReadAuditLog { .. } => "audit.read",
        }
    }

    /// The capability required to perform this intent.
    #[must_use]
    pub const fn capability(&self) -> Capability {
        match self {
            Self::ReadFile { .. } => Capability::FsRead,
            Self::WriteFile { .. } => Capability::FsWrite,
            Self::TempGet { .. } | Self::TempPut { .. } => Capability::TempStorage,
            Self::SpawnProcess { .. } => Capability::SpawnProcess,
            Self::Fetch { .. } => Capability::NetworkFetch,
            Self::OpenWindow { .. } => Capability::OpenWindow,
            Self::Notify { .. } => Capability::Notify,
            Self::ReadAuditLog { .. } => Capability::ReadAudit,
        }
    }

    /// Convert into the raw wire form, declaring the required capability.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters cannot be serialized.
    pub fn to_spec(&self) -> IpcResult<IntentSpec> {
        let mut tagged = serde_json::to_value(self)?;
        let params = tagged.get_mut("params").map(Value::take);
        Ok(IntentSpec::new(
            self.action(),
            self.capability().as_str(),
            params,
        ))
    }

    /// Parse the raw wire form.
    ///
    /// Only `action` and `params` are read. Whether the declared capability
    /// matches is for the caller to decide.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::InvalidIntent`] for an unknown action or
    /// parameters that do not fit it.
    pub fn from_spec(spec: &IntentSpec) -> IpcResult<Self> {
        let params = spec.params.clone().unwrap_or_else(|| json!({}));
        serde_json::from_value(json!({ "action": spec.action, "params": params }))
            .map_err(|e| IpcError::InvalidIntent(format!("{}: {e}", spec.action)))
    }
}

/// An authorized intent handed to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentRequest {
    /// Request id of the originating envelope.
    pub request_id: String,
    /// Requesting application.
    pub app_id: String,
    /// Pid of the requesting spawn.
    pub pid: Pid,
    /// Trace id of the operation.
    pub trace_id: String,
    /// Operation tag, if the unit supplied one.
    pub op_id: Option<String>,
    /// Capability the request was authorized against.
    pub capability: Capability,
    /// The parsed intent.
    pub intent: Intent,
}

/// What the dispatcher made of an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentOutcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Action that was performed.
    pub action: String,
    /// Requesting application.
    pub app_id: String,
    /// Trace id of the operation.
    pub trace_id: String,
    /// Operation tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_id: Option<String>,
    /// Result data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Decision taken by the handler, if it applied its own policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
}

impl IntentOutcome {
    fn for_request(request: &IntentRequest, success: bool) -> Self {
        Self {
            success,
            action: request.intent.action().to_string(),
            app_id: request.app_id.clone(),
            trace_id: request.trace_id.clone(),
            op_id: request.op_id.clone(),
            data: None,
            error: None,
            decision: None,
        }
    }

    /// A successful, allowed outcome.
    #[must_use]
    pub fn ok(request: &IntentRequest, data: Option<Value>) -> Self {
        let mut outcome = Self::for_request(request, true);
        outcome.data = data;
        outcome.decision = Some(Decision::allow());
        outcome
    }

    /// The handler refused the operation.
    #[must_use]
    pub fn denied(request: &IntentRequest, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut outcome = Self::for_request(request, false);
        outcome.decision = Some(Decision::deny(reason.clone()));
        outcome.error = Some(reason);
        outcome
    }

    /// The operation was allowed but failed.
    #[must_use]
    pub fn failed(request: &IntentRequest, error: impl Into<String>) -> Self {
        let mut outcome = Self::for_request(request, false);
        outcome.error = Some(error.into());
        outcome
    }
}
