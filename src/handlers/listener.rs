//! Queue listener handler.
//!
//! Consumed events on routing keys under `log` are written to a [`LogSink`];
//! anything else is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::bus::{topic_matches, BusError, Event, EventHandler};
use crate::clients::{ClientError, HttpClient};
use crate::config::{SinkConfig, SinkType};
use crate::storage::{init_storage, LogStore, NewLogEntry, StorageConfig, StorageError, StorageType};

/// Routing keys the handler persists.
const LOG_TOPIC_PATTERN: &str = "log.#";

/// Destination for consumed log entries.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn write(&self, entry: NewLogEntry) -> Result<(), BusError>;
}

/// Writes entries straight into a log store.
pub struct StorageSink {
    store: Arc<dyn LogStore>,
}

impl StorageSink {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LogSink for StorageSink {
    async fn write(&self, entry: NewLogEntry) -> Result<(), BusError> {
        let id = self
            .store
            .insert(entry)
            .await
            .map_err(|e| BusError::Handler(e.to_string()))?;
        debug!(id = %id, "log entry stored");
        Ok(())
    }
}

/// POSTs entries to the logger's `/log` endpoint.
pub struct HttpSink {
    client: HttpClient,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: HttpClient::new(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LogSink for HttpSink {
    async fn write(&self, entry: NewLogEntry) -> Result<(), BusError> {
        let (status, body) = self
            .client
            .call_http("log service", &self.url, &entry)
            .await
            .map_err(|e| BusError::Handler(e.to_string()))?;

        if !status.is_success() {
            let e = ClientError::Status {
                service: "log service".to_string(),
                status: status.to_string(),
                message: body.to_string(),
            };
            return Err(BusError::Handler(e.to_string()));
        }
        Ok(())
    }
}

/// Errors building the listener's sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("storage sink over the memory backend is private to the listener; use the http sink or a shared backend")]
    PrivateStore,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Build the sink named by `sink`.
pub async fn init_sink(
    sink: &SinkConfig,
    storage: &StorageConfig,
) -> Result<Arc<dyn LogSink>, SinkError> {
    info!(sink_type = ?sink.sink_type, "Initializing log sink");

    match sink.sink_type {
        SinkType::Http => Ok(Arc::new(HttpSink::new(sink.url.clone(), sink.timeout())?)),
        SinkType::Storage if storage.storage_type == StorageType::Memory => {
            Err(SinkError::PrivateStore)
        }
        SinkType::Storage => Ok(Arc::new(StorageSink::new(init_storage(storage).await?))),
    }
}

/// [`EventHandler`] that forwards log events to a sink.
pub struct LogEventHandler {
    sink: Arc<dyn LogSink>,
}

impl LogEventHandler {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl EventHandler for LogEventHandler {
    fn handle(&self, routing_key: &str, event: Arc<Event>) -> BoxFuture<'static, Result<(), BusError>> {
        let sink = Arc::clone(&self.sink);
        let routing_key = routing_key.to_string();

        Box::pin(async move {
            if !topic_matches(LOG_TOPIC_PATTERN, &routing_key) {
                warn!(routing_key = %routing_key, name = %event.name, "dropping event on non-log routing key");
                return Ok(());
            }

            sink.write(NewLogEntry::new(event.name.clone(), event.data.clone()))
                .await?;
            info!(routing_key = %routing_key, name = %event.name, "log event persisted");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLogStore;

    fn handler_over(store: Arc<MemoryLogStore>) -> LogEventHandler {
        LogEventHandler::new(Arc::new(StorageSink::new(store)))
    }

    #[tokio::test]
    async fn test_log_topics_are_persisted() {
        let store = Arc::new(MemoryLogStore::new());
        let handler = handler_over(store.clone());

        for key in ["log", "log.INFO", "log.WARNING", "log.ERROR"] {
            handler
                .handle(key, Arc::new(Event::new("authentication", "x logged in")))
                .await
                .unwrap();
        }

        let entries = store.all().await.unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.name == "authentication"));
        assert!(entries.iter().all(|e| e.created_at.timestamp() > 0));
    }

    #[tokio::test]
    async fn test_other_topics_are_dropped() {
        let store = Arc::new(MemoryLogStore::new());
        let handler = handler_over(store.clone());

        handler
            .handle("mail.sent", Arc::new(Event::new("mail", "sent")))
            .await
            .unwrap();
        handler
            .handle("logs.INFO", Arc::new(Event::new("near miss", "x")))
            .await
            .unwrap();

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_as_handler_error() {
        let store = Arc::new(MemoryLogStore::new());
        store.set_fail_on_insert(true).await;
        let handler = handler_over(store);

        let result = handler
            .handle("log.INFO", Arc::new(Event::new("event", "x")))
            .await;

        assert!(matches!(result, Err(BusError::Handler(_))));
    }

    #[tokio::test]
    async fn test_storage_sink_refuses_private_memory_store() {
        let sink = SinkConfig {
            sink_type: SinkType::Storage,
            ..SinkConfig::default()
        };

        let result = init_sink(&sink, &StorageConfig::default()).await;

        assert!(matches!(result, Err(SinkError::PrivateStore)));
    }

    #[tokio::test]
    async fn test_default_sink_forwards_to_logger() {
        let logged = Arc::new(tokio::sync::Mutex::new(Vec::<NewLogEntry>::new()));
        let captured = logged.clone();
        let app = axum::Router::new().route(
            "/log",
            axum::routing::post(move |axum::Json(entry): axum::Json<NewLogEntry>| {
                let captured = captured.clone();
                async move {
                    captured.lock().await.push(entry);
                    axum::http::StatusCode::ACCEPTED
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let sink_config = SinkConfig {
            url: format!("http://{}/log", addr),
            ..SinkConfig::default()
        };
        let sink = init_sink(&sink_config, &StorageConfig::default()).await.unwrap();
        let handler = LogEventHandler::new(sink);

        handler
            .handle("log.INFO", Arc::new(Event::new("authentication", "x logged in")))
            .await
            .unwrap();

        let logged = logged.lock().await;
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].name, "authentication");
        assert_eq!(logged[0].data, "x logged in");
    }

    #[tokio::test]
    async fn test_http_sink_unreachable_is_handler_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = HttpSink::new(format!("http://{}/log", addr), Duration::from_secs(2)).unwrap();
        let result = sink.write(NewLogEntry::new("event", "x")).await;

        match result {
            Err(BusError::Handler(message)) => assert!(message.contains("connection")),
            other => panic!("expected handler error, got {:?}", other),
        }
    }
}
