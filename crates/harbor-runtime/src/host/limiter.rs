//! Sliding-window rate limiting per (app, capability).

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use harbor_capabilities::{Capability, RateLimit};

/// Counts recent uses of each (app id, capability) pair.
///
/// A use is admitted when fewer than `limit.count` admitted uses fall
/// inside the trailing `limit.window_ms`. Rejected attempts are not
/// recorded, so hammering a limit does not extend it.
#[derive(Debug, Default)]
pub(crate) struct RateLimiter {
    windows: DashMap<(String, Capability), VecDeque<Instant>>,
}

impl RateLimiter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Admit or reject one use.
    pub(crate) fn check(&self, app_id: &str, capability: Capability, limit: RateLimit) -> bool {
        let now = Instant::now();
        let window = Duration::from_millis(limit.window_ms);
        let mut uses = self
            .windows
            .entry((app_id.to_string(), capability))
            .or_default();

        while uses
            .front()
            .is_some_and(|used| now.duration_since(*used) >= window)
        {
            uses.pop_front();
        }

        let count = usize::try_from(limit.count).unwrap_or(usize::MAX);
        if uses.len() >= count {
            return false;
        }
        uses.push_back(now);
        true
    }

    /// Drop all windows of an app.
    pub(crate) fn forget(&self, app_id: &str) {
        self.windows.retain(|(owner, _), _| owner != app_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: RateLimit = RateLimit::new(3, 1_000);

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.check("a", Capability::Notify, LIMIT));
        }
        assert!(!limiter.check("a", Capability::Notify, LIMIT));

        // Other pairs have their own window.
        assert!(limiter.check("b", Capability::Notify, LIMIT));
        assert!(limiter.check("a", Capability::TempStorage, LIMIT));
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("a", Capability::Notify, LIMIT));
        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(limiter.check("a", Capability::Notify, LIMIT));
        assert!(limiter.check("a", Capability::Notify, LIMIT));
        assert!(!limiter.check("a", Capability::Notify, LIMIT));

        // The first use leaves the window.
        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(limiter.check("a", Capability::Notify, LIMIT));
        assert!(!limiter.check("a", Capability::Notify, LIMIT));
    }

    #[tokio::test(start_paused = true)]
    async fn forget_resets_an_app() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            limiter.check("a", Capability::Notify, LIMIT);
        }
        limiter.check("b", Capability::Notify, LIMIT);

        limiter.forget("a");
        assert!(limiter.check("a", Capability::Notify, LIMIT));
        assert_eq!(limiter.windows.len(), 2);
    }
}
