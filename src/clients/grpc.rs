//! gRPC downstream client for the logger's `LogService`.

use std::time::Duration;

use tonic::transport::Endpoint;
use tonic::Code;
use tracing::debug;

use super::ClientError;
use crate::proto::log_service_client::LogServiceClient;
use crate::proto::{Log, LogRequest};

const SERVICE: &str = "log service (grpc)";

/// Client for `logs.LogService/WriteLog`.
#[derive(Clone)]
pub struct GrpcLogClient {
    timeout: Duration,
}

impl GrpcLogClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Dial `addr` ("host:port"), write one log entry and return the result string.
    pub async fn call_grpc(&self, addr: &str, entry: Log) -> Result<String, ClientError> {
        let endpoint = Endpoint::from_shared(format!("http://{}", addr))
            .map_err(|e| ClientError::protocol(SERVICE, format!("Invalid URI: {}", e)))?
            .connect_timeout(self.timeout)
            .timeout(self.timeout);

        let call = async {
            let channel = endpoint
                .connect()
                .await
                .map_err(|e| ClientError::unavailable(SERVICE, e))?;

            let response = LogServiceClient::new(channel)
                .write_log(LogRequest {
                    log_entry: Some(entry),
                })
                .await
                .map_err(|status| self.map_status(status))?;

            Ok::<_, ClientError>(response.into_inner().result)
        };

        let result = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ClientError::timeout(SERVICE, self.timeout))??;

        debug!(addr = %addr, "gRPC call completed");
        Ok(result)
    }

    fn map_status(&self, status: tonic::Status) -> ClientError {
        match status.code() {
            Code::DeadlineExceeded => ClientError::timeout(SERVICE, self.timeout),
            Code::Unavailable => ClientError::unavailable(SERVICE, status.message()),
            code => ClientError::Status {
                service: SERVICE.to_string(),
                status: format!("{:?}", code),
                message: status.message().to_string(),
            },
        }
    }
}
