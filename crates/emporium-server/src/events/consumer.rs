//! Events consumer: subscribes to the configured topics and logs every
//! event it receives.

use std::future::Future;

use async_nats::jetstream::Context as JetStreamContext;
use async_nats::jetstream::consumer::AckPolicy;
use async_nats::jetstream::consumer::pull::Config as PullConsumerConfig;
use futures_util::StreamExt;
use tokio::task::JoinSet;

use super::EventError;
use super::nats::{connect, ensure_stream};
use crate::config::EventsConfig;

/// Runs until `shutdown` resolves or every subscription has ended.
pub async fn run_consumer<F>(config: &EventsConfig, shutdown: F) -> Result<(), EventError>
where
    F: Future<Output = ()>,
{
    let jetstream = connect(config, &config.consumer_name).await?;

    let mut tasks = JoinSet::new();
    for topic in &config.consumer_topics {
        let jetstream = jetstream.clone();
        let prefix = config.stream_prefix.clone();
        let durable = format!("{}-{}", config.consumer_name, topic);
        let topic = topic.clone();
        tasks.spawn(async move {
            if let Err(e) = consume_topic(&jetstream, &prefix, &topic, &durable).await {
                tracing::error!(topic = %topic, error = %e, "subscription ended");
            }
        });
    }
    tracing::info!(topics = ?config.consumer_topics, "events consumer running");

    let drained = tokio::select! {
        _ = shutdown => false,
        _ = async { while tasks.join_next().await.is_some() {} } => true,
    };
    if drained {
        tracing::warn!("all subscriptions ended");
    } else {
        tracing::info!("events consumer shutting down");
        tasks.abort_all();
    }
    Ok(())
}

async fn consume_topic(
    jetstream: &JetStreamContext,
    prefix: &str,
    topic: &str,
    durable: &str,
) -> Result<(), EventError> {
    let stream = ensure_stream(jetstream, prefix, topic).await?;
    let consumer = stream
        .get_or_create_consumer(
            durable,
            PullConsumerConfig {
                durable_name: Some(durable.to_string()),
                ack_policy: AckPolicy::Explicit,
                ..Default::default()
            },
        )
        .await
        .map_err(|e| EventError::Consumer(e.to_string()))?;

    let mut messages = consumer
        .messages()
        .await
        .map_err(|e| EventError::Consumer(e.to_string()))?;

    while let Some(message) = messages.next().await {
        let message = message.map_err(|e| EventError::Consumer(e.to_string()))?;
        log_event(&message.subject, &message.payload);
        if let Err(e) = message.ack().await {
            tracing::warn!(topic, error = %e, "failed to ack event");
        }
    }
    Ok(())
}

fn log_event(topic: &str, payload: &[u8]) {
    match serde_json::from_slice::<serde_json::Value>(payload) {
        Ok(event) => tracing::info!(topic, event = %event, "event received"),
        Err(e) => tracing::warn!(
            topic,
            error = %e,
            raw = %String::from_utf8_lossy(payload),
            "event received with a payload that is not JSON"
        ),
    }
}
