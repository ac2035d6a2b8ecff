//! AMQP (RabbitMQ) publisher and subscriber.
//!
//! Both sides declare the same durable topic exchange. Subscribers consume
//! from one server-named, exclusive, auto-delete queue bound once per topic.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicRejectOptions,
        ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, ExchangeKind,
};
use tracing::{debug, error, info, Instrument};

use super::{BusError, Connection, Event, EventHandler, EventPublisher, EventSubscriber, Result};

/// Consumer tag for listener consumers.
const CONSUMER_TAG: &str = "switchyard-listener";

/// Persistent delivery mode.
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Declare the topic exchange on a channel.
async fn declare_exchange(channel: &Channel, exchange: &str) -> Result<()> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Channel(format!("Failed to declare exchange: {}", e)))
}

// ============================================================================
// Publisher
// ============================================================================

/// Publishes events to the topic exchange on a dedicated channel.
pub struct AmqpPublisher {
    channel: Channel,
    exchange: String,
}

impl AmqpPublisher {
    /// Open a publishing channel on `connection` and declare the exchange.
    pub async fn new(connection: &Connection, exchange: impl Into<String>) -> Result<Self> {
        let exchange = exchange.into();
        let channel = connection.create_channel().await?;
        declare_exchange(&channel, &exchange).await?;

        info!(exchange = %exchange, "AMQP publisher ready");

        Ok(Self { channel, exchange })
    }
}

#[async_trait]
impl EventPublisher for AmqpPublisher {
    #[tracing::instrument(name = "bus.publish", skip_all, fields(topic = %topic))]
    async fn publish(&self, topic: &str, event: &Event) -> Result<()> {
        let payload = event.to_bytes()?;

        self.channel
            .basic_publish(
                &self.exchange,
                topic,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(DELIVERY_MODE_PERSISTENT),
            )
            .await
            .map_err(|e| BusError::Channel(format!("Failed to publish: {}", e)))?
            .await
            .map_err(|e| BusError::Channel(format!("Publish confirmation failed: {}", e)))?;

        debug!(
            exchange = %self.exchange,
            topic = %topic,
            name = %event.name,
            "Published event"
        );

        Ok(())
    }
}

// ============================================================================
// Subscriber
// ============================================================================

/// Consumes events from the topic exchange on a dedicated channel.
pub struct AmqpSubscriber {
    channel: Channel,
    exchange: String,
}

impl AmqpSubscriber {
    /// Open a consuming channel on `connection` and declare the exchange.
    pub async fn new(connection: &Connection, exchange: impl Into<String>) -> Result<Self> {
        let exchange = exchange.into();
        let channel = connection.create_channel().await?;
        declare_exchange(&channel, &exchange).await?;

        Ok(Self { channel, exchange })
    }

    /// Declare an anonymous queue and bind it once per topic.
    async fn bind_queue(&self, topics: &[String]) -> Result<String> {
        let queue = self
            .channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Channel(format!("Failed to declare queue: {}", e)))?;
        let queue = queue.name().as_str().to_string();

        for topic in topics {
            self.channel
                .queue_bind(
                    &queue,
                    &self.exchange,
                    topic,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| BusError::Channel(format!("Failed to bind queue: {}", e)))?;

            info!(queue = %queue, topic = %topic, "Bound queue to exchange");
        }

        Ok(queue)
    }

    /// Decode and hand one delivery to the handler, then settle it.
    async fn process_delivery(delivery: Delivery, handler: &Arc<dyn EventHandler>) {
        let routing_key = delivery.routing_key.as_str().to_string();

        match Event::from_bytes(&delivery.data) {
            Ok(event) => {
                let span = tracing::info_span!("bus.consume", routing_key = %routing_key);

                if let Err(e) = handler
                    .handle(&routing_key, Arc::new(event))
                    .instrument(span)
                    .await
                {
                    error!(routing_key = %routing_key, error = %e, "Handler failed");
                }

                if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
                    error!(error = %e, "Failed to ack message");
                }
            }
            Err(e) => {
                error!(routing_key = %routing_key, error = %e, "Failed to decode event");
                // Malformed bodies are dropped, never requeued
                if let Err(e) = delivery
                    .acker
                    .reject(BasicRejectOptions { requeue: false })
                    .await
                {
                    error!(error = %e, "Failed to reject message");
                }
            }
        }
    }
}

#[async_trait]
impl EventSubscriber for AmqpSubscriber {
    async fn listen(&self, topics: &[String], handler: Arc<dyn EventHandler>) -> Result<()> {
        let queue = self.bind_queue(topics).await?;

        let mut consumer = self
            .channel
            .basic_consume(
                &queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Channel(format!("Failed to start consumer: {}", e)))?;

        info!(queue = %queue, topics = ?topics, "Consuming events");

        // One delivery at a time keeps per-topic ordering intact
        while let Some(delivery) = consumer.next().await {
            match delivery {
                Ok(delivery) => Self::process_delivery(delivery, &handler).await,
                Err(e) => {
                    error!(error = %e, "Consumer delivery error");
                    return Err(BusError::Channel(format!("Consumer failed: {}", e)));
                }
            }
        }

        Err(BusError::Channel("Consumer stream ended".to_string()))
    }
}
