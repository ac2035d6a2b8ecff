//! switchyard-gateway: HTTP front door (broker service)
//!
//! Accepts `{action, payload}` requests and forwards each to exactly one
//! downstream: the auth, log or mail services over HTTP, the logger over RPC
//! or gRPC, or the log exchange on RabbitMQ.
//!
//! ## Architecture
//! ```text
//! client --HTTP--> [switchyard-gateway] --HTTP--> auth / logger / mailer
//!                          |           --RPC/gRPC--> logger
//!                          +--AMQP (logs_topic)--> [switchyard-listener]
//! ```
//!
//! ## Configuration
//! - `gateway.*` and `messaging.*` sections (see `config.yaml`)
//! - RABBIT_URL: broker URL override
//! - SWITCHYARD_LOG: log filter (default: info)

use std::sync::Arc;

use tracing::{error, info, warn};

use switchyard::bus::{AmqpPublisher, Connector};
use switchyard::config::Config;
use switchyard::handlers::gateway::{router, ActionDispatcher};
use switchyard::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    let connector = Connector::new(config.gateway.backoff);
    let connection = connector
        .connect(&config.messaging.url)
        .await
        .map_err(|e| {
            error!(error = %e, "Could not connect to RabbitMQ");
            e
        })?;

    let publisher = AmqpPublisher::new(&connection, config.messaging.exchange.clone()).await?;
    let dispatcher = ActionDispatcher::new(
        config.gateway.downstream.clone(),
        config.gateway.log_topic.clone(),
        Arc::new(publisher),
    )?;

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "switchyard-gateway started");

    let served = axum::serve(listener, router(Arc::new(dispatcher)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Err(e) = connection.close().await {
        warn!(error = %e, "Failed to close broker connection");
    }

    served?;
    Ok(())
}
