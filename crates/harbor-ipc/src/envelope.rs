//! The envelope wire format.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use harbor_capabilities::Capability;
use harbor_core::{Decision, ErrorCode, new_request_id, new_trace_id};

use crate::error::{IpcError, IpcResult};
use crate::intent::{IntentOutcome, IntentSpec};

/// Kind of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Host to unit: granted capabilities and timing parameters.
    Init,
    /// Unit to host: initialization finished.
    Ready,
    /// Unit to host: request a privileged operation.
    IntentRequest,
    /// Host to unit: outcome of an intent.
    IntentResponse,
    /// Unit to host: liveness signal.
    Heartbeat,
    /// Either direction: a fault report.
    Error,
    /// Host to unit: shut down.
    Terminate,
}

impl MessageType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Ready => "READY",
            Self::IntentRequest => "INTENT_REQUEST",
            Self::IntentResponse => "INTENT_RESPONSE",
            Self::Heartbeat => "HEARTBEAT",
            Self::Error => "ERROR",
            Self::Terminate => "TERMINATE",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "INIT" => Self::Init,
            "READY" => Self::Ready,
            "INTENT_REQUEST" => Self::IntentRequest,
            "INTENT_RESPONSE" => Self::IntentResponse,
            "HEARTBEAT" => Self::Heartbeat,
            "ERROR" => Self::Error,
            "TERMINATE" => Self::Terminate,
            _ => return None,
        })
    }

    /// Types only the host may send. A unit sending one is bypassing the
    /// protocol.
    #[must_use]
    pub const fn is_host_only(self) -> bool {
        matches!(self, Self::Init | Self::Terminate)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an `INIT` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    /// Capabilities granted to the unit.
    pub capabilities: Vec<Capability>,
    /// How often the unit should heartbeat.
    pub heartbeat_interval_ms: u64,
    /// How long the unit should wait for an intent response.
    pub intent_timeout_ms: u64,
}

/// A single IPC message.
///
/// Every envelope carries a `type`, a fresh `requestId`, the `appId` of the
/// unit it concerns and a `traceId` shared by all messages of one logical
/// operation. The remaining fields depend on the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Correlation id of this message.
    pub request_id: String,
    /// Application the message concerns.
    pub app_id: String,
    /// Trace id of the logical operation.
    pub trace_id: String,
    /// Human-diagnosable operation tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_id: Option<String>,
    /// Type-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Result data of a successful intent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error details, either a string or `{code, message}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Raw intent of an `INTENT_REQUEST`. Parsed separately so a malformed
    /// intent can still be answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Value>,
    /// Whether an intent succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Allow/deny decision of an intent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
}

impl Envelope {
    fn bare(kind: MessageType, app_id: &str, trace_id: String) -> Self {
        Self {
            kind,
            request_id: new_request_id(),
            app_id: app_id.to_string(),
            trace_id,
            op_id: None,
            payload: None,
            data: None,
            error: None,
            intent: None,
            success: None,
            decision: None,
        }
    }

    /// Build an `INIT` envelope.
    #[must_use]
    pub fn init(app_id: &str, payload: &InitPayload) -> Self {
        let mut envelope = Self::bare(MessageType::Init, app_id, new_trace_id());
        // A struct of plain fields always serializes.
        envelope.payload = serde_json::to_value(payload).ok();
        envelope
    }

    /// Build a `READY` envelope answering `init`.
    #[must_use]
    pub fn ready(init: &Self) -> Self {
        Self::bare(MessageType::Ready, &init.app_id, init.trace_id.clone())
    }

    /// Build a `HEARTBEAT` envelope.
    #[must_use]
    pub fn heartbeat(app_id: &str) -> Self {
        Self::bare(MessageType::Heartbeat, app_id, new_trace_id())
    }

    /// Build an `INTENT_REQUEST` envelope with a fresh trace id.
    #[must_use]
    pub fn intent_request(app_id: &str, spec: &IntentSpec, op_id: String) -> Self {
        let mut envelope = Self::bare(MessageType::IntentRequest, app_id, new_trace_id());
        envelope.op_id = Some(op_id);
        envelope.intent = Some(json!({
            "action": spec.action,
            "capability": spec.capability,
            "params": spec.params,
        }));
        envelope
    }

    /// Build the `INTENT_RESPONSE` for `request` from a dispatcher outcome.
    #[must_use]
    pub fn intent_response(request: &Self, outcome: &IntentOutcome) -> Self {
        let mut envelope = request.reply(MessageType::IntentResponse);
        envelope.success = Some(outcome.success);
        envelope.data.clone_from(&outcome.data);
        envelope.error = outcome
            .error
            .as_ref()
            .map(|message| json!({ "message": message }));
        envelope.decision.clone_from(&outcome.decision);
        envelope
    }

    /// Build a denying `INTENT_RESPONSE` for `request`.
    #[must_use]
    pub fn deny(request: &Self, code: ErrorCode, reason: &str) -> Self {
        let mut envelope = request.reply(MessageType::IntentResponse);
        envelope.success = Some(false);
        envelope.error = Some(error_body(code, reason));
        envelope.decision = Some(Decision::deny(reason));
        envelope
    }

    /// Build an `ERROR` envelope.
    #[must_use]
    pub fn error(app_id: &str, code: ErrorCode, message: &str) -> Self {
        let mut envelope = Self::bare(MessageType::Error, app_id, new_trace_id());
        envelope.error = Some(error_body(code, message));
        envelope
    }

    /// Build an `ERROR` envelope answering `request`.
    #[must_use]
    pub fn error_reply(request: &Self, code: ErrorCode, message: &str) -> Self {
        let mut envelope = request.reply(MessageType::Error);
        envelope.error = Some(error_body(code, message));
        envelope
    }

    /// Build a `TERMINATE` envelope.
    #[must_use]
    pub fn terminate(app_id: &str) -> Self {
        Self::bare(MessageType::Terminate, app_id, new_trace_id())
    }

    // Replies reuse the request's correlation ids so the waiter can match them.
    fn reply(&self, kind: MessageType) -> Self {
        let mut envelope = Self::bare(kind, &self.app_id, self.trace_id.clone());
        envelope.request_id.clone_from(&self.request_id);
        envelope.op_id.clone_from(&self.op_id);
        envelope
    }

    /// Validate and decode an incoming message.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::InvalidMessage`] when the value is not an object
    /// or one of `type`, `requestId`, `appId`, `traceId` is missing or not
    /// a string, and [`IpcError::UnknownMessageType`] when `type` names no
    /// known message type.
    pub fn from_value(value: Value) -> IpcResult<Self> {
        let Value::Object(map) = &value else {
            return Err(IpcError::InvalidMessage("message is not an object".into()));
        };

        let kind = required_str(map, "type")?;
        if MessageType::from_wire(kind).is_none() {
            return Err(IpcError::UnknownMessageType(kind.to_string()));
        }
        for field in ["requestId", "appId", "traceId"] {
            required_str(map, field)?;
        }

        serde_json::from_value(value).map_err(|e| IpcError::InvalidMessage(e.to_string()))
    }

    /// Decode the `INIT` payload.
    ///
    /// # Errors
    ///
    /// Returns an error when the envelope has no payload or it is malformed.
    pub fn init_payload(&self) -> IpcResult<InitPayload> {
        let payload = self
            .payload
            .clone()
            .ok_or_else(|| IpcError::InvalidMessage("INIT without payload".into()))?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Decode the raw intent.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::InvalidIntent`] when the envelope carries no
    /// intent or its `action`/`capability` are missing.
    pub fn intent_spec(&self) -> IpcResult<IntentSpec> {
        let raw = self
            .intent
            .clone()
            .ok_or_else(|| IpcError::InvalidIntent("missing intent".into()))?;
        serde_json::from_value(raw).map_err(|e| IpcError::InvalidIntent(e.to_string()))
    }

    /// Human-readable error message, if the envelope carries one.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => Some(
                map.get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| Value::Object(map.clone()).to_string(), str::to_string),
            ),
            other => Some(other.to_string()),
        }
    }

    /// Error code, if the envelope carries a recognized one.
    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error
            .as_ref()?
            .get("code")
            .and_then(Value::as_str)
            .and_then(ErrorCode::from_wire)
    }
}

fn error_body(code: ErrorCode, message: &str) -> Value {
    json!({ "code": code, "message": message })
}

fn required_str<'a>(map: &'a Map<String, Value>, field: &str) -> IpcResult<&'a str> {
    match map.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(IpcError::InvalidMessage(format!("{field} is not a string"))),
        None => Err(IpcError::InvalidMessage(format!("missing {field}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: &str) -> Value {
        json!({
            "type": kind,
            "requestId": "r-1",
            "appId": "core.files",
            "traceId": "t-1",
        })
    }

    #[test]
    fn valid_envelope_decodes() {
        let envelope = Envelope::from_value(raw("HEARTBEAT")).unwrap();
        assert_eq!(envelope.kind, MessageType::Heartbeat);
        assert_eq!(envelope.app_id, "core.files");
        assert!(envelope.intent.is_none());
    }

    #[test]
    fn missing_header_fields_are_rejected() {
        for field in ["type", "requestId", "appId", "traceId"] {
            let mut value = raw("READY");
            value.as_object_mut().unwrap().remove(field);
            let err = Envelope::from_value(value).unwrap_err();
            assert!(matches!(err, IpcError::InvalidMessage(_)), "{field}: {err}");
        }
    }

    #[test]
    fn non_string_header_is_rejected() {
        let mut value = raw("READY");
        value["requestId"] = json!(42);
        assert!(matches!(
            Envelope::from_value(value),
            Err(IpcError::InvalidMessage(_))
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(matches!(
            Envelope::from_value(raw("SHUTDOWN_EVERYTHING")),
            Err(IpcError::UnknownMessageType(t)) if t == "SHUTDOWN_EVERYTHING"
        ));
        assert!(Envelope::from_value(json!("READY")).is_err());
    }

    #[test]
    fn malformed_intent_still_decodes_the_envelope() {
        let mut value = raw("INTENT_REQUEST");
        value["intent"] = json!({ "params": {} });
        let envelope = Envelope::from_value(value).unwrap();
        assert!(matches!(
            envelope.intent_spec(),
            Err(IpcError::InvalidIntent(_))
        ));
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let envelope = Envelope::init(
            "core.files",
            &InitPayload {
                capabilities: vec![Capability::FsRead],
                heartbeat_interval_ms: 10_000,
                intent_timeout_ms: 30_000,
            },
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "INIT");
        assert_eq!(json["appId"], "core.files");
        assert_eq!(json["payload"]["capabilities"][0], "fs.read");
        assert_eq!(json["payload"]["heartbeatIntervalMs"], 10_000);
        assert_eq!(json["payload"]["intentTimeoutMs"], 30_000);
        assert_eq!(json["payload"].as_object().unwrap().len(), 3);
        assert!(json.get("success").is_none());

        let back = Envelope::from_value(json).unwrap();
        assert_eq!(back.init_payload().unwrap().capabilities, vec![Capability::FsRead]);
    }

    #[test]
    fn deny_reply_keeps_correlation_ids() {
        let spec = IntentSpec::new("fs.read", "fs.read", Some(json!({ "path": "/a" })));
        let request = Envelope::intent_request("com.example.notes", &spec, "fs.read#1".into());
        let reply = Envelope::deny(&request, ErrorCode::CapabilityDenied, "not granted");

        assert_eq!(reply.kind, MessageType::IntentResponse);
        assert_eq!(reply.request_id, request.request_id);
        assert_eq!(reply.trace_id, request.trace_id);
        assert_eq!(reply.op_id.as_deref(), Some("fs.read#1"));
        assert_eq!(reply.success, Some(false));
        assert_eq!(reply.error_code(), Some(ErrorCode::CapabilityDenied));
        assert_eq!(reply.error_message().as_deref(), Some("not granted"));
        assert!(!reply.decision.unwrap().is_allowed());
    }

    #[test]
    fn string_errors_are_read_back() {
        let mut value = raw("ERROR");
        value["error"] = json!("out of memory");
        let envelope = Envelope::from_value(value).unwrap();
        assert_eq!(envelope.error_message().as_deref(), Some("out of memory"));
        assert_eq!(envelope.error_code(), None);
    }

    #[test]
    fn host_only_types() {
        assert!(MessageType::Init.is_host_only());
        assert!(MessageType::Terminate.is_host_only());
        assert!(!MessageType::IntentRequest.is_host_only());
        assert_eq!(
            MessageType::from_wire(MessageType::IntentResponse.as_str()),
            Some(MessageType::IntentResponse)
        );
    }
}
