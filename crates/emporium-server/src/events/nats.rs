//! NATS JetStream publisher.
//!
//! Each topic gets its own stream named `<PREFIX>_<TOPIC>`. Streams are
//! declared on first use and remembered for the life of the process.

use std::time::Duration;

use async_nats::ConnectOptions;
use async_nats::jetstream::{self, Context as JetStreamContext};
use async_nats::jetstream::stream::{Config as StreamConfig, Stream as StreamHandle};
use async_trait::async_trait;
use dashmap::DashSet;

use super::{EventError, EventPublisher};
use crate::config::EventsConfig;

const STREAM_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Connects to the broker. A failure here is fatal for the caller.
pub async fn connect(
    config: &EventsConfig,
    client_name: &str,
) -> Result<JetStreamContext, EventError> {
    let options = ConnectOptions::new()
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .name(client_name);

    let client = async_nats::connect_with_options(config.url.as_str(), options)
        .await
        .map_err(|e| EventError::Connect(e.to_string()))?;

    tracing::info!(url = %config.url, "connected to NATS");
    Ok(jetstream::new(client))
}

pub fn stream_name(prefix: &str, topic: &str) -> String {
    format!("{prefix}_{topic}").to_ascii_uppercase()
}

/// Declares the stream for `topic` if it does not exist.
pub async fn ensure_stream(
    jetstream: &JetStreamContext,
    prefix: &str,
    topic: &str,
) -> Result<StreamHandle, EventError> {
    let config = StreamConfig {
        name: stream_name(prefix, topic),
        subjects: vec![topic.to_string()],
        max_age: STREAM_MAX_AGE,
        ..Default::default()
    };

    jetstream
        .get_or_create_stream(config)
        .await
        .map_err(|e| EventError::Stream {
            topic: topic.to_string(),
            message: e.to_string(),
        })
}

pub struct NatsPublisher {
    jetstream: JetStreamContext,
    stream_prefix: String,
    declared: DashSet<String>,
}

impl NatsPublisher {
    pub async fn connect(config: &EventsConfig, client_name: &str) -> Result<Self, EventError> {
        let jetstream = connect(config, client_name).await?;
        Ok(Self {
            jetstream,
            stream_prefix: config.stream_prefix.clone(),
            declared: DashSet::new(),
        })
    }

    async fn ensure_declared(&self, topic: &str) -> Result<(), EventError> {
        if self.declared.contains(topic) {
            return Ok(());
        }
        ensure_stream(&self.jetstream, &self.stream_prefix, topic).await?;
        self.declared.insert(topic.to_string());
        tracing::debug!(topic, "stream declared");
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), EventError> {
        self.ensure_declared(topic).await?;

        // The returned ack future is dropped: delivery is not awaited.
        let _ack = self
            .jetstream
            .publish(topic.to_string(), payload.into())
            .await
            .map_err(|e| EventError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}
