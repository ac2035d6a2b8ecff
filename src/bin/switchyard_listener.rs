//! switchyard-listener: log event consumer
//!
//! Binds one anonymous queue to the log exchange for every configured topic
//! and persists each consumed event.
//!
//! ## Configuration
//! - `listener.*` and `messaging.*` sections (see `config.yaml`)
//! - `listener.sink.type`: `http` (default) POSTs to the logger at
//!   `listener.sink.url`; `storage` writes into `storage.*` and needs a shared
//!   backend
//! - RABBIT_URL: broker URL override
//! - SWITCHYARD_LOG: log filter (default: info)

use std::sync::Arc;

use tracing::{error, info, warn};

use switchyard::bus::{AmqpSubscriber, Connector, EventHandler, EventSubscriber};
use switchyard::config::Config;
use switchyard::handlers::listener::{init_sink, LogEventHandler};
use switchyard::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    let sink = init_sink(&config.listener.sink, &config.storage)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to initialize log sink");
            e
        })?;

    let connector = Connector::new(config.listener.backoff);
    let connection = connector
        .connect(&config.messaging.url)
        .await
        .map_err(|e| {
            error!(error = %e, "Could not connect to RabbitMQ");
            e
        })?;

    let subscriber = AmqpSubscriber::new(&connection, config.messaging.exchange.clone()).await?;
    let handler: Arc<dyn EventHandler> = Arc::new(LogEventHandler::new(sink));

    info!(topics = ?config.listener.topics, "Listening for and consuming RabbitMQ messages");

    let result = tokio::select! {
        result = subscriber.listen(&config.listener.topics, handler) => result,
        _ = shutdown_signal() => Ok(()),
    };

    if let Err(e) = connection.close().await {
        warn!(error = %e, "Failed to close broker connection");
    }

    result.map_err(|e| {
        error!(error = %e, "Consumer stopped");
        e
    })?;
    Ok(())
}
