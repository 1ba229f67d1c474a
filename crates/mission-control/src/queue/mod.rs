//! # Queue Ingress
//!
//! Long-lived consumer of the service queue. Each delivery carries the same
//! envelope as `POST /message`; the caller identity is the envelope's
//! `userId` (default `system`) — the queue path is not privileged.
//!
//! Deliveries carrying `replyTo` and `correlationId` receive a correlated
//! reply: `RESPONSE` with the handler's return value, or `ERROR` with the
//! failure. Handler errors never stop the consumer loop.

use std::sync::Arc;

use futures::StreamExt;
use lapin::message::Delivery;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mission_shared::messaging::BrokerClient;
use mission_shared::types::{MessageEnvelope, MessageType};
use mission_shared::MissionResult;

use crate::dispatch::{Caller, Dispatcher};

#[derive(Debug)]
pub struct QueueConsumer {
    broker: BrokerClient,
    dispatcher: Arc<Dispatcher>,
}

impl QueueConsumer {
    pub fn new(broker: BrokerClient, dispatcher: Arc<Dispatcher>) -> Self {
        Self { broker, dispatcher }
    }

    /// Consume until shutdown. Returns when cancelled or when the broker
    /// stream ends.
    pub async fn run(self, cancel: CancellationToken) -> MissionResult<()> {
        let mut consumer = self.broker.consume("mission-control").await?;
        info!(queue = %self.broker.queue_name(), "Queue consumer started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Queue consumer stopped");
                    return Ok(());
                }
                delivery = consumer.next() => {
                    match delivery {
                        Some(Ok(delivery)) => self.handle_delivery(delivery).await,
                        Some(Err(e)) => {
                            warn!(error = %e, "Broker delivery error");
                        }
                        None => {
                            error!("Broker consumer stream ended");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn handle_delivery(&self, delivery: Delivery) {
        let envelope: MessageEnvelope = match serde_json::from_slice(&delivery.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Discarding undecodable queue message");
                if let Err(e) = self.broker.nack(delivery.delivery_tag).await {
                    warn!(error = %e, "Failed to nack undecodable message");
                }
                return;
            }
        };

        debug!(message_type = %envelope.message_type, "Queue message received");

        let reply = (envelope.reply_to.clone(), envelope.correlation_id.clone());
        let caller = Caller::queue(envelope.user_id.as_deref());
        let outcome = self.dispatcher.dispatch(envelope, caller).await;

        if let (Some(reply_to), Some(correlation_id)) = reply {
            let reply_envelope = match &outcome {
                Ok(outcome) => {
                    let mut content = json!({ "message": outcome.message });
                    if let Some(result) = &outcome.result {
                        content["result"] = result.clone();
                    }
                    reply_with(MessageType::Response, content, &correlation_id)
                }
                Err(e) => reply_with(
                    MessageType::Error,
                    json!({ "error": e.kind(), "message": e.to_string() }),
                    &correlation_id,
                ),
            };
            if let Err(e) = self
                .broker
                .publish_reply(&reply_to, &correlation_id, &reply_envelope)
                .await
            {
                warn!(reply_to = %reply_to, error = %e, "Failed to publish reply");
            }
        } else if let Err(e) = &outcome {
            warn!(error = %e, "Queue handler failed (no reply requested)");
        }

        if let Err(e) = self.broker.ack(delivery.delivery_tag).await {
            warn!(error = %e, "Failed to ack delivery");
        }
    }
}

fn reply_with(
    message_type: MessageType,
    content: serde_json::Value,
    correlation_id: &str,
) -> MessageEnvelope {
    let mut envelope = MessageEnvelope::outbound(message_type, content);
    envelope.correlation_id = Some(correlation_id.to_string());
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_envelope_success_shape() {
        let envelope = reply_with(
            MessageType::Response,
            json!({"message": "Mission paused"}),
            "corr-1",
        );
        assert_eq!(envelope.message_type, "RESPONSE");
        assert_eq!(envelope.sender, "MissionControl");
        assert_eq!(envelope.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(
            envelope.content.as_ref().unwrap()["message"],
            "Mission paused"
        );
    }

    #[test]
    fn test_reply_envelope_error_shape() {
        let envelope = reply_with(
            MessageType::Error,
            json!({"error": "not_found", "message": "no such mission"}),
            "corr-2",
        );
        assert_eq!(envelope.message_type, "ERROR");
        assert_eq!(envelope.content.as_ref().unwrap()["error"], "not_found");
    }
}
