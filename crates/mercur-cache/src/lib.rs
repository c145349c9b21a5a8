//! # Mercur Cache
//!
//! Redis-backed caching and order-event publication shared by the services.
//!
//! Two concerns live here because they share one broker:
//! - `cache`: JSON lookup caches with the platform's key and TTL classes.
//! - `events`: the `pos:events:*` order-event channels.

pub mod cache;
pub mod events;

pub use cache::Cache;
pub use events::{EventPublisher, OrderEvent, OrderEventType, ALL_EVENTS_CHANNEL};
