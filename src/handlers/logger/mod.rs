//! Log-writer service front ends.
//!
//! Three servers share one `Arc<dyn LogStore>`:
//! - HTTP: `POST /log` plus the entry management routes
//! - binary RPC: `RPCServer.LogInfo` ([`rpc::RpcServer`])
//! - gRPC: `logs.LogService/WriteLog` ([`grpc::LogGrpcService`])

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::storage::{LogStore, NewLogEntry, StorageError};
use crate::utils::response::{ActionReply, ActionResponse};

pub mod grpc;
pub mod rpc;

pub use grpc::LogGrpcService;
pub use rpc::RpcServer;


type AppState = Arc<dyn LogStore>;

/// Body of `POST /log` and `PUT /logs/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogPayload {
    pub name: String,
    pub data: String,
}

/// Build the logger's HTTP router.
pub fn router(store: Arc<dyn LogStore>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/log", post(write_log))
        .route("/logs", get(all_logs).delete(drop_logs))
        .route("/logs/:id", put(update_log).get(get_log))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Map a storage failure to the HTTP failure envelope.
fn storage_failure(e: StorageError) -> ActionReply {
    match e {
        StorageError::NotFound(_) => ActionReply::failure(StatusCode::NOT_FOUND, e.to_string()),
        StorageError::InvalidId(_) => ActionReply::failure(StatusCode::BAD_REQUEST, e.to_string()),
        e => {
            error!(error = %e, "log storage call failed");
            ActionReply::failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn ping() -> &'static str {
    "."
}

async fn write_log(State(store): State<AppState>, Json(payload): Json<LogPayload>) -> ActionReply {
    match store.insert(NewLogEntry::new(payload.name, payload.data)).await {
        Ok(id) => {
            info!(id = %id, "log entry written");
            ActionReply::accepted("logged")
        }
        Err(e) => storage_failure(e),
    }
}

async fn all_logs(State(store): State<AppState>) -> ActionReply {
    match store.all().await {
        Ok(entries) => ActionReply::new(
            StatusCode::OK,
            ActionResponse::ok(format!("{} log entries", entries.len())).with_data(json!(entries)),
        ),
        Err(e) => storage_failure(e),
    }
}

async fn get_log(State(store): State<AppState>, Path(id): Path<String>) -> ActionReply {
    match store.get_one(&id).await {
        Ok(entry) => ActionReply::new(
            StatusCode::OK,
            ActionResponse::ok("log entry").with_data(json!(entry)),
        ),
        Err(e) => storage_failure(e),
    }
}

async fn update_log(
    State(store): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<LogPayload>,
) -> ActionReply {
    let mut entry = match store.get_one(&id).await {
        Ok(entry) => entry,
        Err(e) => return storage_failure(e),
    };
    entry.name = payload.name;
    entry.data = payload.data;

    match store.update(&entry).await {
        Ok(outcome) => ActionReply::new(
            StatusCode::ACCEPTED,
            ActionResponse::ok("updated").with_data(json!(outcome)),
        ),
        Err(e) => storage_failure(e),
    }
}

async fn drop_logs(State(store): State<AppState>) -> ActionReply {
    match store.drop_collection().await {
        Ok(()) => {
            info!("log collection dropped");
            ActionReply::accepted("dropped")
        }
        Err(e) => storage_failure(e),
    }
}
