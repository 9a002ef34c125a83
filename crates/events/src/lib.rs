//! Price publication: messages, the pub/sub abstraction and fan-out to
//! downstream consumers.
//!
//! No IO lives here. Transport-backed consumers (Redis) are provided by
//! `pricebook-infra`.

pub mod bus;
pub mod in_memory_bus;
pub mod message;
pub mod publisher;

pub use bus::{EventBus, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use message::PriceMessage;
pub use publisher::{BusConsumer, ConsumerError, FanoutPublisher, PriceConsumer, PublishReport};
