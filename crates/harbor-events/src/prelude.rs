//! Prelude module - commonly used types for convenient import.
//!
//! Use `use harbor_events::prelude::*;` to import all essential types.

pub use crate::{
    EventBus, EventMetadata, EventReceiver, EventSubscriber, FnSubscriber, RuntimeEvent,
    SubscriberId, SubscriberRegistry,
};
