//! Transport-backed implementations of the `pricebook-events` bus.
//!
//! The bus abstraction itself lives in `pricebook-events` as pure mechanics.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::{redis_consumers, RedisBusError, RedisPubSubEventBus};
