//! Publishers that never leave the process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EventError, EventPublisher};

/// Logs events instead of publishing them. Used when the broker is disabled.
#[derive(Debug, Default, Clone)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), EventError> {
        tracing::info!(
            topic,
            payload = %String::from_utf8_lossy(&payload),
            "events disabled, not published"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Keeps every published event in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingPublisher {
    events: Arc<Mutex<Vec<PublishedEvent>>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher that rejects every event.
    pub fn failing() -> Self {
        Self {
            events: Arc::default(),
            fail: true,
        }
    }

    pub async fn events(&self) -> Vec<PublishedEvent> {
        self.events.lock().await.clone()
    }

    pub async fn topics(&self) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .map(|e| e.topic.clone())
            .collect()
    }

    /// Waits up to two seconds for at least `count` events and returns
    /// whatever was recorded by then.
    pub async fn wait_for(&self, count: usize) -> Vec<PublishedEvent> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let events = self.events().await;
            if events.len() >= count || tokio::time::Instant::now() >= deadline {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), EventError> {
        if self.fail {
            return Err(EventError::Publish {
                topic: topic.to_string(),
                message: "recording publisher set to fail".into(),
            });
        }
        let payload = serde_json::from_slice(&payload)?;
        self.events.lock().await.push(PublishedEvent {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}
