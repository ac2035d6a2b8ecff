//! gRPC `LogService` implementation.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{error, info};

use crate::proto::log_service_server::LogService;
use crate::proto::{LogRequest, LogResponse};
use crate::storage::{LogStore, NewLogEntry};

/// Result string of a successful `WriteLog`.
pub const GRPC_LOGGED: &str = "logged via GRPC!";

pub struct LogGrpcService {
    store: Arc<dyn LogStore>,
}

impl LogGrpcService {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl LogService for LogGrpcService {
    async fn write_log(
        &self,
        request: Request<LogRequest>,
    ) -> Result<Response<LogResponse>, Status> {
        let entry = request
            .into_inner()
            .log_entry
            .ok_or_else(|| Status::invalid_argument("log entry is required"))?;

        let id = self
            .store
            .insert(NewLogEntry::new(entry.name, entry.data))
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC log write failed");
                Status::internal(e.to_string())
            })?;

        info!(id = %id, "log entry written via gRPC");
        Ok(Response::new(LogResponse {
            result: GRPC_LOGGED.to_string(),
        }))
    }
}
