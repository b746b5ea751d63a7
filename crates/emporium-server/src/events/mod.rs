//! Domain events.
//!
//! Services call [`EventEmitter::emit`] after a mutation has been committed.
//! The emit returns immediately; publishing happens on a spawned task and
//! failures are only logged. Delivery is at most once.

pub mod consumer;
pub mod memory;
pub mod nats;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use consumer::run_consumer;
pub use memory::{LogPublisher, PublishedEvent, RecordingPublisher};
pub use nats::NatsPublisher;

pub const USER_REGISTERED: &str = "user_registered";
pub const USER_CONFIRMED: &str = "user_confirmed";
pub const USER_UPDATED: &str = "user_updated";
pub const USER_DELETED: &str = "user_deleted";
pub const INSTRUMENT_CREATED: &str = "instrument_created";
pub const INSTRUMENT_UPDATED: &str = "instrument_updated";
pub const INSTRUMENT_DELETED: &str = "instrument_deleted";
pub const CART_UPDATED: &str = "cart_updated";
pub const CART_CLEARED: &str = "cart_cleared";
pub const ORDER_CREATED: &str = "order_created";
pub const ORDER_DELETED: &str = "order_deleted";

pub const ALL_TOPICS: &[&str] = &[
    USER_REGISTERED,
    USER_CONFIRMED,
    USER_UPDATED,
    USER_DELETED,
    INSTRUMENT_CREATED,
    INSTRUMENT_UPDATED,
    INSTRUMENT_DELETED,
    CART_UPDATED,
    CART_CLEARED,
    ORDER_CREATED,
    ORDER_DELETED,
];

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("failed to connect to broker: {0}")]
    Connect(String),

    #[error("failed to declare stream for '{topic}': {message}")]
    Stream { topic: String, message: String },

    #[error("failed to publish to '{topic}': {message}")]
    Publish { topic: String, message: String },

    #[error("consumer error: {0}")]
    Consumer(String),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sends an encoded payload to a topic.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), EventError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEvent {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentEvent {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemEvent {
    pub user_id: String,
    pub instrument_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEvent {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    UserRegistered(UserEvent),
    UserConfirmed(UserEvent),
    UserUpdated(UserEvent),
    UserDeleted(UserEvent),
    InstrumentCreated(InstrumentEvent),
    InstrumentUpdated(InstrumentEvent),
    InstrumentDeleted(InstrumentEvent),
    CartUpdated(CartItemEvent),
    CartCleared(CartEvent),
    OrderCreated(OrderEvent),
    OrderDeleted(OrderEvent),
}

impl Event {
    pub fn topic(&self) -> &'static str {
        match self {
            Event::UserRegistered(_) => USER_REGISTERED,
            Event::UserConfirmed(_) => USER_CONFIRMED,
            Event::UserUpdated(_) => USER_UPDATED,
            Event::UserDeleted(_) => USER_DELETED,
            Event::InstrumentCreated(_) => INSTRUMENT_CREATED,
            Event::InstrumentUpdated(_) => INSTRUMENT_UPDATED,
            Event::InstrumentDeleted(_) => INSTRUMENT_DELETED,
            Event::CartUpdated(_) => CART_UPDATED,
            Event::CartCleared(_) => CART_CLEARED,
            Event::OrderCreated(_) => ORDER_CREATED,
            Event::OrderDeleted(_) => ORDER_DELETED,
        }
    }

    /// JSON payload without any envelope.
    pub fn encode(&self) -> Result<Vec<u8>, EventError> {
        let bytes = match self {
            Event::UserRegistered(e)
            | Event::UserConfirmed(e)
            | Event::UserUpdated(e)
            | Event::UserDeleted(e) => serde_json::to_vec(e)?,
            Event::InstrumentCreated(e)
            | Event::InstrumentUpdated(e)
            | Event::InstrumentDeleted(e) => serde_json::to_vec(e)?,
            Event::CartUpdated(e) => serde_json::to_vec(e)?,
            Event::CartCleared(e) => serde_json::to_vec(e)?,
            Event::OrderCreated(e) | Event::OrderDeleted(e) => serde_json::to_vec(e)?,
        };
        Ok(bytes)
    }

    pub fn user(topic: fn(UserEvent) -> Event, user_id: &str, email: &str) -> Self {
        topic(UserEvent {
            user_id: user_id.to_string(),
            email: email.to_string(),
        })
    }
}

/// Fire-and-forget front of an [`EventPublisher`].
#[derive(Clone)]
pub struct EventEmitter {
    publisher: Arc<dyn EventPublisher>,
}

impl EventEmitter {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    /// Publishes in the background. Never blocks and never fails.
    pub fn emit(&self, event: Event) {
        let topic = event.topic();
        let payload = match event.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(topic, error = %e, "dropping event that failed to encode");
                return;
            }
        };

        let publisher = Arc::clone(&self.publisher);
        tokio::spawn(async move {
            match publisher.publish(topic, payload).await {
                Ok(()) => tracing::debug!(topic, "event published"),
                Err(e) => tracing::warn!(topic, error = %e, "event publish failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_use_stable_field_names() {
        let event = Event::user(Event::UserRegistered, "u1", "a@b.c");
        let json: serde_json::Value = serde_json::from_slice(&event.encode().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"user_id": "u1", "email": "a@b.c"}));
        assert_eq!(event.topic(), "user_registered");

        let event = Event::CartUpdated(CartItemEvent {
            user_id: "u1".into(),
            instrument_id: "i1".into(),
        });
        let json: serde_json::Value = serde_json::from_slice(&event.encode().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"user_id": "u1", "instrument_id": "i1"})
        );
    }

    #[tokio::test]
    async fn emit_returns_before_publish_and_swallows_failures() {
        let failing = RecordingPublisher::failing();
        let emitter = EventEmitter::new(Arc::new(failing.clone()));
        emitter.emit(Event::InstrumentDeleted(InstrumentEvent { id: "i1".into() }));

        let recorder = RecordingPublisher::new();
        let emitter = EventEmitter::new(Arc::new(recorder.clone()));
        emitter.emit(Event::OrderCreated(OrderEvent {
            order_id: "o1".into(),
            user_id: "u1".into(),
        }));

        let events = recorder.wait_for(1).await;
        assert_eq!(events[0].topic, ORDER_CREATED);
        assert_eq!(events[0].payload["order_id"], "o1");
    }
}
