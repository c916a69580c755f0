//! The seam between the host and whatever performs intents.

use async_trait::async_trait;
use tracing::debug;

use harbor_ipc::{IntentOutcome, IntentRequest};

/// Performs authorized intents.
///
/// The host has already checked the capability grant and rate limit by the
/// time `dispatch` is called; handlers may still apply finer policy (path
/// restrictions, domain allowlists) and answer with a denied outcome.
/// Dispatch runs on its own task, so a slow handler never stalls the host
/// loop.
#[async_trait]
pub trait IntentDispatcher: Send + Sync {
    /// Perform the intent.
    async fn dispatch(&self, request: IntentRequest) -> IntentOutcome;
}

/// Denies every intent. The host's default when nothing else is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllDispatcher;

#[async_trait]
impl IntentDispatcher for DenyAllDispatcher {
    async fn dispatch(&self, request: IntentRequest) -> IntentOutcome {
        debug!(
            app_id = %request.app_id,
            action = request.intent.action(),
            "No handler for intent"
        );
        let reason = format!("no handler for {}", request.intent.action());
        IntentOutcome::denied(&request, reason)
    }
}
