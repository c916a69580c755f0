//! Harbor Events - change notification and audit feed for the runtime host.
//!
//! This crate provides:
//! - [`RuntimeEvent`], every observable registry mutation and policy decision
//! - A broadcast-based [`EventBus`] for async subscribers
//! - A [`SubscriberRegistry`] for synchronous handlers
//!
//! # Architecture
//!
//! The runtime registry publishes an event after each mutation completes.
//! Synchronous subscribers are invoked inline, before `publish` returns,
//! which gives the ops surface an at-least-once, in-order view of every
//! change. Async receivers get the same events through a broadcast channel
//! and may lag.
//!
//! # Example
//!
//! ```rust
//! use harbor_events::{EventBus, EventMetadata, RuntimeEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(RuntimeEvent::RegistryCleared {
//!     metadata: EventMetadata::new("registry"),
//!     removed: 0,
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "registry_cleared");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;
mod subscriber;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventMetadata, RuntimeEvent};
pub use subscriber::{EventSubscriber, FnSubscriber, SubscriberId, SubscriberRegistry};
