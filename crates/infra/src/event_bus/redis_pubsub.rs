//! Redis pub/sub-backed price bus (feature `redis`).
//!
//! Pub/sub is not durable: messages are dropped while no subscriber is
//! connected. Price messages tolerate that, since the next publish run
//! re-sends every unpublished record.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use redis::Commands;

use pricebook_events::{BusConsumer, EventBus, PriceConsumer, PriceMessage, Subscription};

#[derive(Debug, thiserror::Error)]
pub enum RedisBusError {
    #[error("redis error: {0}")]
    Redis(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Redis pub/sub bus carrying JSON price messages on one channel.
#[derive(Debug, Clone)]
pub struct RedisPubSubEventBus {
    client: redis::Client,
    channel: String,
}

impl RedisPubSubEventBus {
    pub fn new(redis_url: impl AsRef<str>, channel: impl Into<String>) -> Result<Self, RedisBusError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(|e| RedisBusError::Redis(e.to_string()))?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl EventBus<PriceMessage> for RedisPubSubEventBus {
    type Error = RedisBusError;

    fn publish(&self, message: PriceMessage) -> Result<(), Self::Error> {
        let payload = message.to_json().map_err(|e| RedisBusError::Serialize(e.to_string()))?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;

        let _: i64 = conn
            .publish(&self.channel, payload)
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;

        Ok(())
    }

    fn subscribe(&self) -> Subscription<PriceMessage> {
        let (tx, rx) = mpsc::channel();

        let client = self.client.clone();
        let channel = self.channel.clone();

        // Background thread forwarding channel messages into the subscription.
        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(_) => return,
            };

            let mut pubsub = conn.as_pubsub();
            if pubsub.subscribe(&channel).is_err() {
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(_) => return,
                };

                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let message: PriceMessage = match serde_json::from_str(&payload) {
                    Ok(m) => m,
                    Err(_) => continue,
                };

                if tx.send(message).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}

/// One consumer per configured channel, named after the channel.
pub fn redis_consumers(
    redis_url: &str,
    channels: &[String],
) -> Result<Vec<Arc<dyn PriceConsumer>>, RedisBusError> {
    channels
        .iter()
        .map(|channel| {
            let bus = RedisPubSubEventBus::new(redis_url, channel.clone())?;
            Ok(Arc::new(BusConsumer::new(format!("redis:{channel}"), bus)) as Arc<dyn PriceConsumer>)
        })
        .collect()
}
