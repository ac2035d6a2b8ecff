//! switchyard-logger: log-writer service
//!
//! Persists log entries received over HTTP, the binary RPC protocol and
//! gRPC. All three servers share one log store.
//!
//! ## Configuration
//! - `logger.*` (ports) and `storage.*` sections (see `config.yaml`)
//! - SWITCHYARD_LOG: log filter (default: info)

use std::future::IntoFuture;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic_health::server::health_reporter;
use tracing::{error, info};

use switchyard::config::Config;
use switchyard::handlers::logger::{self, LogGrpcService, RpcServer};
use switchyard::proto::log_service_server::LogServiceServer;
use switchyard::storage::init_storage;
use switchyard::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    let host = config.logger.host.as_str();

    let store = init_storage(&config.storage).await?;

    let web_listener = TcpListener::bind((host, config.logger.web_port)).await?;
    let rpc_listener = TcpListener::bind((host, config.logger.rpc_port)).await?;
    let grpc_listener = TcpListener::bind((host, config.logger.grpc_port)).await?;

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<LogServiceServer<LogGrpcService>>()
        .await;

    info!(
        web_port = config.logger.web_port,
        rpc_port = config.logger.rpc_port,
        grpc_port = config.logger.grpc_port,
        "switchyard-logger started"
    );

    let http = axum::serve(web_listener, logger::router(store.clone())).into_future();
    let rpc = RpcServer::new(store.clone()).serve(rpc_listener);
    let grpc = Server::builder()
        .add_service(health_service)
        .add_service(LogServiceServer::new(LogGrpcService::new(store)))
        .serve_with_incoming(TcpListenerStream::new(grpc_listener));

    tokio::select! {
        result = http => result?,
        result = rpc => result?,
        result = grpc => result?,
        _ = shutdown_signal() => {}
    }

    Ok(())
}
