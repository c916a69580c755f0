//! Process identifiers and correlation ids.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Host-generated, opaque identifier for one spawn of an execution unit.
///
/// A `Pid` is never reused: every spawn receives a fresh value even when
/// the same application is spawned again after termination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(String);

impl Pid {
    /// Wrap a raw pid string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The pid as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Pid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Allocates process-unique [`Pid`]s.
///
/// Pids combine a per-allocator nonce with a monotonic sequence number, so
/// two allocators (e.g. two hosts in one test binary) never collide either.
#[derive(Debug)]
pub struct PidAllocator {
    nonce: String,
    next: AtomicU64,
}

impl PidAllocator {
    /// Create a new allocator with a random nonce.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nonce: short_uuid(),
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next pid.
    pub fn next_pid(&self) -> Pid {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        Pid(format!("rt-{}-{seq}", self.nonce))
    }
}

impl Default for PidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a fresh request id (unique per message).
#[must_use]
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a fresh trace id (unique per logical operation).
#[must_use]
pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a human-diagnosable operation tag, e.g. `fs.read#3f2a9c1b`.
#[must_use]
pub fn new_op_id(action: &str) -> String {
    format!("{action}#{}", short_uuid())
}

fn short_uuid() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}
