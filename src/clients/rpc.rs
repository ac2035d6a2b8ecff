//! Binary RPC downstream client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use super::ClientError;
use crate::rpc::{self, RpcPayload, RpcRequest, RpcResponse, LOG_INFO_METHOD};

const SERVICE: &str = "log service (rpc)";

/// Client for the logger's `RPCServer.LogInfo` method.
#[derive(Clone)]
pub struct RpcClient {
    timeout: Duration,
    seq: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Dial `addr`, call `LogInfo` once and return its reply string.
    pub async fn call_rpc(&self, addr: &str, payload: RpcPayload) -> Result<String, ClientError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);

        let call = async {
            let stream = TcpStream::connect(addr)
                .await
                .map_err(|e| ClientError::unavailable(SERVICE, e))?;
            let mut stream = rpc::framed(stream);

            let request = RpcRequest {
                seq,
                method: LOG_INFO_METHOD.to_string(),
                payload,
            };
            rpc::send(&mut stream, &request)
                .await
                .map_err(|e| ClientError::protocol(SERVICE, e))?;

            let response: RpcResponse = rpc::recv(&mut stream)
                .await
                .map_err(|e| ClientError::protocol(SERVICE, e))?;
            if response.seq != seq {
                return Err(ClientError::protocol(
                    SERVICE,
                    format!("expected reply {}, got {}", seq, response.seq),
                ));
            }

            match response.error {
                Some(message) => Err(ClientError::Remote {
                    service: SERVICE.to_string(),
                    message,
                }),
                None => Ok(response.reply),
            }
        };

        let reply = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ClientError::timeout(SERVICE, self.timeout))??;

        debug!(addr = %addr, seq, "RPC call completed");
        Ok(reply)
    }
}
