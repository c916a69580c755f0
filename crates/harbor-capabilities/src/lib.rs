//! Harbor Capabilities - who may hold which privileged operation class.
//!
//! This crate provides:
//! - The fixed [`Capability`] vocabulary
//! - [`TrustLevel`] derivation from an application id
//! - The static [`PolicyTable`] describing each capability
//! - The [`grant`] function partitioning requested capabilities
//!
//! # Security Model
//!
//! Granting is fail-closed: a requested name that is not part of the
//! vocabulary, or that has no registered policy, is always denied.
//!
//! # Example
//!
//! ```
//! use harbor_capabilities::{grant, Capability, PolicyTable, TrustClassifier};
//!
//! let table = PolicyTable::builtin();
//! let trust = TrustClassifier::default().classify("com.example.notes");
//! let outcome = grant(&table, &["fs.read", "fs.write"], trust, false);
//!
//! assert!(outcome.granted.contains(&Capability::FsRead));
//! assert!(outcome.denied.contains_key("fs.write"));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod capability;
mod error;
mod grant;
mod policy;
mod trust;

pub use capability::Capability;
pub use error::{CapabilityError, CapabilityResult};
pub use grant::{DenialReason, GrantOutcome, grant};
pub use policy::{CapabilityPolicy, PolicyTable, RateLimit};
pub use trust::{DEFAULT_FIRST_PARTY_PREFIX, TrustClassifier, TrustLevel};
