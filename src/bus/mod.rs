//! Message bus for async log delivery.
//!
//! This module contains:
//! - `Event`: the `{name, data}` unit exchanged over the queue
//! - `EventPublisher` / `EventSubscriber` traits: publish and consume by topic
//! - `EventHandler` trait: per-message processing callback
//! - Connector: broker connection with bounded backoff
//! - Implementations: AMQP (RabbitMQ), in-memory channel bus, mock publisher

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub mod amqp;
pub mod channel;
pub mod connector;
pub mod mock;

pub use amqp::{AmqpPublisher, AmqpSubscriber};
pub use channel::{ChannelEventBus, ChannelSubscription};
pub use connector::{Connection, Connector};
pub use mock::MockPublisher;

/// Topic exchange all log events are published to.
pub const LOGS_EXCHANGE: &str = "logs_topic";

/// Routing key for informational log events.
pub const TOPIC_LOG_INFO: &str = "log.INFO";
/// Routing key for warning log events.
pub const TOPIC_LOG_WARNING: &str = "log.WARNING";
/// Routing key for error log events.
pub const TOPIC_LOG_ERROR: &str = "log.ERROR";

/// Topics the listener binds by default.
pub fn default_log_topics() -> Vec<String> {
    vec![
        TOPIC_LOG_INFO.to_string(),
        TOPIC_LOG_WARNING.to_string(),
        TOPIC_LOG_ERROR.to_string(),
    ]
}

// ============================================================================
// Errors
// ============================================================================

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection attempts exhausted after {attempts} tries: {last_error}")]
    ConnectionExhausted { attempts: u32, last_error: String },

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Event codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Handler failed: {0}")]
    Handler(String),
}

// ============================================================================
// Event
// ============================================================================

/// Payload unit exchanged over the queue.
///
/// Serialized as JSON `{"name": ..., "data": ...}` for transit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub data: String,
}

impl Event {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Encode to the JSON wire body.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from a JSON wire body.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Handler for processing events taken off the bus.
///
/// Errors are reported by the consumer loop and never stop it.
pub trait EventHandler: Send + Sync {
    fn handle(&self, routing_key: &str, event: Arc<Event>) -> BoxFuture<'static, Result<()>>;
}

/// Publishes events to the topic exchange.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `event` with `topic` as routing key.
    async fn publish(&self, topic: &str, event: &Event) -> Result<()>;
}

/// Consumes events for a set of topics.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Bind every topic and consume until a channel-level failure.
    ///
    /// Per-message handler errors are logged; only consumer failures return.
    async fn listen(&self, topics: &[String], handler: Arc<dyn EventHandler>) -> Result<()>;
}

// ============================================================================
// Topic matching
// ============================================================================

/// AMQP topic-exchange match of a binding `pattern` against a routing `key`.
///
/// Words are dot separated. `*` matches exactly one word and `#` matches zero
/// or more words.
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&first, key_rest)) => (word == "*" || word == first) && match_words(rest, key_rest),
            None => false,
        },
    }
}
