//! # Broker Client
//!
//! Thin AMQP wrapper for the service queue. Mission Control consumes its own
//! queue for command envelopes and publishes correlated replies to the
//! `replyTo` queue named by the sender. The broker is an external
//! collaborator: Mission Control keeps no durable work-queue of its own.

use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{MissionControlError, MissionResult};

/// AMQP client bound to one channel.
///
/// Cloneable; all clones share the underlying connection.
#[derive(Clone)]
pub struct BrokerClient {
    channel: Channel,
    queue_name: String,
}

impl std::fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient")
            .field("queue_name", &self.queue_name)
            .finish()
    }
}

impl BrokerClient {
    /// Connect to the broker and declare the service queue
    pub async fn connect(url: &str, queue_name: &str, prefetch: u16) -> MissionResult<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;

        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(queue = %queue_name, "Connected to broker and declared service queue");

        Ok(Self {
            channel,
            queue_name: queue_name.to_string(),
        })
    }

    /// The service queue this client consumes
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Start consuming the service queue
    pub async fn consume(&self, consumer_tag: &str) -> MissionResult<Consumer> {
        let consumer = self
            .channel
            .basic_consume(
                &self.queue_name,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer)
    }

    /// Publish a JSON payload to a named queue (default exchange routing)
    pub async fn publish<T: Serialize>(&self, queue: &str, payload: &T) -> MissionResult<()> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| MissionControlError::Internal(format!("reply serialization: {e}")))?;

        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await?
            .await?;

        debug!(queue = %queue, bytes = body.len(), "Published message");
        Ok(())
    }

    /// Publish a correlated reply to the sender's reply queue
    pub async fn publish_reply<T: Serialize>(
        &self,
        reply_to: &str,
        correlation_id: &str,
        payload: &T,
    ) -> MissionResult<()> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| MissionControlError::Internal(format!("reply serialization: {e}")))?;

        self.channel
            .basic_publish(
                "",
                reply_to,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_correlation_id(correlation_id.into()),
            )
            .await?
            .await?;

        debug!(reply_to = %reply_to, correlation_id = %correlation_id, "Published reply");
        Ok(())
    }

    /// Acknowledge a delivery
    pub async fn ack(&self, delivery_tag: u64) -> MissionResult<()> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await?;
        Ok(())
    }

    /// Negatively acknowledge a delivery without requeue (malformed payloads
    /// would fail identically on redelivery)
    pub async fn nack(&self, delivery_tag: u64) -> MissionResult<()> {
        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue: false,
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }
}
