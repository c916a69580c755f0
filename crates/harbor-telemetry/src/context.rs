//! Trace context for correlating host operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context carried through one logical operation (a spawn, an intent).
///
/// The `trace_id` is the same value that travels in the envelope's
/// `traceId`, so log lines from the host, the dispatcher and the unit can
/// be joined on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Trace id shared by every step of the operation.
    pub trace_id: String,
    /// Component that created this context.
    pub source: String,
    /// Application the operation concerns.
    pub app_id: Option<String>,
    /// Operation being performed.
    pub operation: Option<String>,
    /// When the operation started.
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    /// Create a context with a fresh trace id.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_trace_id(source, Uuid::new_v4().to_string())
    }

    /// Create a context continuing an existing trace.
    #[must_use]
    pub fn with_trace_id(source: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            source: source.into(),
            app_id: None,
            operation: None,
            started_at: Utc::now(),
        }
    }

    /// Set the application id.
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// A context for a follow-up step in another component. Keeps the trace.
    #[must_use]
    pub fn child(&self, source: impl Into<String>) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            source: source.into(),
            app_id: self.app_id.clone(),
            operation: None,
            started_at: Utc::now(),
        }
    }

    /// Milliseconds since the context was created.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
    }

    /// A span carrying the context's fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "op",
            trace_id = %self.trace_id,
            source = %self.source,
            app_id = self.app_id.as_deref(),
            operation = self.operation.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_contexts_get_distinct_traces() {
        let a = RequestContext::new("host");
        let b = RequestContext::new("host");
        assert_ne!(a.trace_id, b.trace_id);
        assert!(a.app_id.is_none());
    }

    #[test]
    fn child_keeps_the_trace() {
        let parent = RequestContext::with_trace_id("router", "t-1")
            .with_app_id("core.files")
            .with_operation("intent");
        let child = parent.child("dispatcher");

        assert_eq!(child.trace_id, "t-1");
        assert_eq!(child.app_id.as_deref(), Some("core.files"));
        assert_eq!(child.source, "dispatcher");
        assert!(child.operation.is_none());
    }

    #[test]
    fn serialization() {
        let ctx = RequestContext::with_trace_id("host", "t-9").with_operation("spawn");
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"trace_id\":\"t-9\""));

        let parsed: RequestContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.operation.as_deref(), Some("spawn"));
    }

    #[tokio::test]
    async fn span_can_instrument_a_future() {
        use tracing::Instrument;

        let ctx = RequestContext::new("test").with_app_id("core.files");
        let value = async { 7 }.instrument(ctx.span()).await;
        assert_eq!(value, 7);
        assert!(ctx.elapsed_ms() >= 0);
    }
}
