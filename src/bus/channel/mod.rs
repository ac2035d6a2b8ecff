//! In-memory channel-based event bus.
//!
//! Uses a tokio broadcast channel for pub/sub within a single process, with
//! AMQP topic-exchange matching applied on the subscriber side. Useful for
//! local development and tests without a running broker.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, error, warn};

use super::{
    topic_matches, BusError, Event, EventHandler, EventPublisher, EventSubscriber, Result,
};

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

/// Routing key plus shared event.
type Envelope = (String, Arc<Event>);

/// In-memory event bus using a tokio broadcast channel.
#[derive(Clone)]
pub struct ChannelEventBus {
    sender: broadcast::Sender<Envelope>,
}

impl Default for ChannelEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Bind a subscription to `topics`.
    ///
    /// Binding happens immediately: events published after this call are
    /// buffered for the subscription even before it starts running.
    pub fn subscribe(&self, topics: &[String]) -> ChannelSubscription {
        ChannelSubscription {
            receiver: self.sender.subscribe(),
            topics: topics.to_vec(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for ChannelEventBus {
    async fn publish(&self, topic: &str, event: &Event) -> Result<()> {
        // Like an exchange with no bindings, an event nobody listens for is dropped
        if self
            .sender
            .send((topic.to_string(), Arc::new(event.clone())))
            .is_err()
        {
            debug!(topic = %topic, "No subscribers, event dropped");
        }
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for ChannelEventBus {
    async fn listen(&self, topics: &[String], handler: Arc<dyn EventHandler>) -> Result<()> {
        self.subscribe(topics).run(handler).await
    }
}

/// A bound subscription on a [`ChannelEventBus`].
pub struct ChannelSubscription {
    receiver: broadcast::Receiver<Envelope>,
    topics: Vec<String>,
}

impl ChannelSubscription {
    fn accepts(&self, routing_key: &str) -> bool {
        self.topics
            .iter()
            .any(|pattern| topic_matches(pattern, routing_key))
    }

    /// Consume until every publisher is gone.
    pub async fn run(mut self, handler: Arc<dyn EventHandler>) -> Result<()> {
        loop {
            match self.receiver.recv().await {
                Ok((routing_key, event)) => {
                    if !self.accepts(&routing_key) {
                        continue;
                    }
                    if let Err(e) = handler.handle(&routing_key, event).await {
                        error!(routing_key = %routing_key, error = %e, "Handler failed");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => {
                    return Err(BusError::Channel("Channel bus closed".to_string()));
                }
            }
        }
    }

    /// Next buffered event matching this subscription, without waiting.
    pub fn try_next(&mut self) -> Option<Envelope> {
        loop {
            match self.receiver.try_recv() {
                Ok((routing_key, event)) if self.accepts(&routing_key) => {
                    return Some((routing_key, event))
                }
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
