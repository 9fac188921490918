//! # Event Bus
//!
//! Topic-exchange pub/sub over a durable RabbitMQ exchange: envelope
//! enrichment (`event_id`, `timestamp`, `source`), the fixed set of routing
//! keys the orchestrator publishes and subscribes to, and the `EventSink`
//! abstraction the rest of the workspace programs against.
//!
//! This is a Layer 0 crate alongside `core-types`: it depends on nothing
//! else in the workspace and knows nothing about runs, iterations, or
//! strategies — only routing keys and JSON payloads.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod routing_keys;

#[cfg(feature = "testing")]
pub mod mock;

pub use bus::{EventBus, EventSink, HandlerFuture};
pub use error::EventsError;
