//! Request/response correlation.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{IpcError, IpcResult};

/// Default time an intent waits for its response.
pub const DEFAULT_INTENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Table of outstanding requests keyed by request id.
///
/// Each registered request gets a [`PendingResponse`] that resolves when
/// [`PendingRequests::resolve`] is called with the same id, or fails with
/// [`IpcError::Timeout`] once the timeout elapses. An entry is removed when
/// it is resolved, cancelled, timed out or its waiter is dropped, so the
/// table never grows past the number of live waiters.
#[derive(Debug)]
pub struct PendingRequests<T> {
    waiters: Arc<DashMap<String, oneshot::Sender<T>>>,
    timeout: Duration,
}

impl<T> Clone for PendingRequests<T> {
    fn clone(&self) -> Self {
        Self {
            waiters: Arc::clone(&self.waiters),
            timeout: self.timeout,
        }
    }
}

impl<T> Default for PendingRequests<T> {
    fn default() -> Self {
        Self::new(DEFAULT_INTENT_TIMEOUT)
    }
}

impl<T> PendingRequests<T> {
    /// Create a table whose waiters give up after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            waiters: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Default waiter timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register a waiter for `request_id`.
    ///
    /// Registering an id that is already pending replaces the old waiter,
    /// which then observes [`IpcError::Cancelled`].
    pub fn register(&self, request_id: impl Into<String>) -> PendingResponse<T> {
        let request_id = request_id.into();
        let (tx, rx) = oneshot::channel();
        if self.waiters.insert(request_id.clone(), tx).is_some() {
            warn!(request_id = %request_id, "Replaced an outstanding waiter");
        }
        PendingResponse {
            request_id,
            rx: Some(rx),
            waiters: Arc::clone(&self.waiters),
            timeout: self.timeout,
        }
    }

    /// Deliver a response. Returns `false` if nobody is waiting for
    /// `request_id` (unknown, already resolved or timed out).
    pub fn resolve(&self, request_id: &str, value: T) -> bool {
        match self.waiters.remove(request_id) {
            Some((_, tx)) => tx.send(value).is_ok(),
            None => {
                debug!(request_id, "No pending waiter for response");
                false
            },
        }
    }

    /// Cancel a waiter. Returns `false` if it was not pending.
    pub fn cancel(&self, request_id: &str) -> bool {
        self.waiters.remove(request_id).is_some()
    }

    /// Cancel every waiter.
    pub fn clear(&self) {
        self.waiters.clear();
    }

    /// Whether `request_id` is pending.
    #[must_use]
    pub fn contains(&self, request_id: &str) -> bool {
        self.waiters.contains_key(request_id)
    }

    /// Number of pending waiters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// The waiting side of one registered request.
#[derive(Debug)]
pub struct PendingResponse<T> {
    request_id: String,
    rx: Option<oneshot::Receiver<T>>,
    waiters: Arc<DashMap<String, oneshot::Sender<T>>>,
    timeout: Duration,
}

impl<T> PendingResponse<T> {
    /// The request id this waiter is correlated with.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait for the response using the table's timeout.
    ///
    /// # Errors
    ///
    /// [`IpcError::Timeout`] if no response arrives in time, and
    /// [`IpcError::Cancelled`] if the waiter was cancelled.
    pub async fn wait(self) -> IpcResult<T> {
        let timeout = self.timeout;
        self.wait_for(timeout).await
    }

    /// Wait for the response with an explicit timeout.
    ///
    /// # Errors
    ///
    /// See [`PendingResponse::wait`].
    pub async fn wait_for(mut self, timeout: Duration) -> IpcResult<T> {
        let Some(rx) = self.rx.take() else {
            return Err(IpcError::Cancelled(self.request_id.clone()));
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(IpcError::Cancelled(self.request_id.clone())),
            Err(_) => {
                evict_closed(&self.waiters, &self.request_id);
                Err(IpcError::Timeout {
                    request_id: self.request_id.clone(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            },
        }
    }
}

impl<T> Drop for PendingResponse<T> {
    fn drop(&mut self) {
        if self.rx.take().is_some() {
            evict_closed(&self.waiters, &self.request_id);
        }
    }
}

// A re-registration under the same id has a live receiver and is kept.
fn evict_closed<T>(waiters: &DashMap<String, oneshot::Sender<T>>, request_id: &str) {
    waiters.remove_if(request_id, |_, tx| tx.is_closed());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_delivers_to_the_waiter() {
        let pending = PendingRequests::<u32>::default();
        let waiter = pending.register("r-1");
        assert!(pending.contains("r-1"));

        assert!(pending.resolve("r-1", 7));
        assert_eq!(waiter.wait().await.unwrap(), 7);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn resolve_unknown_or_resolved_returns_false() {
        let pending = PendingRequests::<u32>::default();
        assert!(!pending.resolve("nobody", 1));

        let _waiter = pending.register("r-1");
        assert!(pending.resolve("r-1", 1));
        assert!(!pending.resolve("r-1", 2));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_evicts_and_fails_once() {
        let pending = PendingRequests::<u32>::new(Duration::from_millis(30_000));
        let waiter = pending.register("r-1");

        let err = waiter.wait().await.unwrap_err();
        assert!(matches!(
            err,
            IpcError::Timeout { ref request_id, timeout_ms: 30_000 } if request_id == "r-1"
        ));
        assert!(pending.is_empty());
        // A late response finds nobody.
        assert!(!pending.resolve("r-1", 1));
    }

    #[tokio::test(start_paused = true)]
    async fn response_just_before_timeout_wins() {
        let pending = PendingRequests::<u32>::new(Duration::from_millis(100));
        let waiter = pending.register("r-1");
        let resolver = pending.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(99)).await;
            resolver.resolve("r-1", 5);
        });

        assert_eq!(waiter.wait().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn cancel_wakes_the_waiter() {
        let pending = PendingRequests::<u32>::default();
        let waiter = pending.register("r-1");
        assert!(pending.cancel("r-1"));
        assert!(matches!(
            waiter.wait().await,
            Err(IpcError::Cancelled(id)) if id == "r-1"
        ));
    }

    #[tokio::test]
    async fn dropping_a_waiter_evicts_it() {
        let pending = PendingRequests::<u32>::default();
        drop(pending.register("r-1"));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn clear_cancels_everything() {
        let pending = PendingRequests::<u32>::default();
        let a = pending.register("a");
        let b = pending.register("b");
        assert_eq!(pending.len(), 2);

        pending.clear();
        assert!(a.wait().await.is_err());
        assert!(b.wait().await.is_err());
    }
}
