//! Fan-out of price messages to every configured consumer.
//!
//! Publication is best effort: a failed send is logged and skipped, and the
//! remaining messages and consumers are still attempted.

use std::sync::Arc;

use crate::bus::EventBus;
use crate::message::PriceMessage;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsumerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

/// A downstream destination for price messages (a queue, a channel, a bus).
pub trait PriceConsumer: Send + Sync {
    fn name(&self) -> &str;

    fn send(&self, message: &PriceMessage) -> Result<(), ConsumerError>;
}

/// Adapts any [`EventBus`] of price messages into a consumer.
#[derive(Debug)]
pub struct BusConsumer<B> {
    name: String,
    bus: B,
}

impl<B> BusConsumer<B> {
    pub fn new(name: impl Into<String>, bus: B) -> Self {
        Self { name: name.into(), bus }
    }
}

impl<B> PriceConsumer for BusConsumer<B>
where
    B: EventBus<PriceMessage>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: &PriceMessage) -> Result<(), ConsumerError> {
        self.bus
            .publish(message.clone())
            .map_err(|e| ConsumerError::Transport(e.to_string()))
    }
}

/// Outcome counts of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub messages: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Sends every message to every consumer.
#[derive(Clone, Default)]
pub struct FanoutPublisher {
    consumers: Vec<Arc<dyn PriceConsumer>>,
}

impl core::fmt::Debug for FanoutPublisher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let names: Vec<&str> = self.consumers.iter().map(|c| c.name()).collect();
        f.debug_struct("FanoutPublisher").field("consumers", &names).finish()
    }
}

impl FanoutPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_consumer(mut self, consumer: Arc<dyn PriceConsumer>) -> Self {
        self.consumers.push(consumer);
        self
    }

    pub fn add_consumer(&mut self, consumer: Arc<dyn PriceConsumer>) {
        self.consumers.push(consumer);
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    pub fn publish(&self, messages: &[PriceMessage]) -> PublishReport {
        let mut report = PublishReport {
            messages: messages.len(),
            ..PublishReport::default()
        };

        for consumer in &self.consumers {
            for message in messages {
                match consumer.send(message) {
                    Ok(()) => report.delivered += 1,
                    Err(err) => {
                        report.failed += 1;
                        tracing::warn!(
                            consumer = consumer.name(),
                            sku = %message.sku,
                            error = %err,
                            "failed to publish price"
                        );
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_bus::InMemoryEventBus;

    struct Broken;

    impl PriceConsumer for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn send(&self, _message: &PriceMessage) -> Result<(), ConsumerError> {
            Err(ConsumerError::Transport("connection refused".to_string()))
        }
    }

    fn messages() -> Vec<PriceMessage> {
        vec![
            PriceMessage::new("A", 10.0, 0.0, 5.0),
            PriceMessage::new("B", 20.0, 25.0, 8.0),
        ]
    }

    #[test]
    fn fans_out_to_every_consumer() {
        let first = Arc::new(InMemoryEventBus::<PriceMessage>::new());
        let second = Arc::new(InMemoryEventBus::<PriceMessage>::new());
        let sub_first = first.subscribe();
        let sub_second = second.subscribe();

        let publisher = FanoutPublisher::new()
            .with_consumer(Arc::new(BusConsumer::new("first", first.clone())))
            .with_consumer(Arc::new(BusConsumer::new("second", second.clone())));

        let report = publisher.publish(&messages());
        assert_eq!(report, PublishReport { messages: 2, delivered: 4, failed: 0 });
        assert_eq!(sub_first.drain(), messages());
        assert_eq!(sub_second.drain(), messages());
    }

    #[test]
    fn failures_are_counted_and_do_not_stop_others() {
        let bus = Arc::new(InMemoryEventBus::<PriceMessage>::new());
        let sub = bus.subscribe();

        let mut publisher = FanoutPublisher::new();
        publisher.add_consumer(Arc::new(Broken));
        publisher.add_consumer(Arc::new(BusConsumer::new("bus", bus.clone())));
        assert_eq!(publisher.consumer_count(), 2);

        let report = publisher.publish(&messages());
        assert_eq!(report.failed, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(sub.drain().len(), 2);
    }

    #[test]
    fn no_consumers_is_a_no_op() {
        let report = FanoutPublisher::new().publish(&messages());
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 0);
    }
}
