//! Binary RPC server for `RPCServer.LogInfo`.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::rpc::{self, RpcError, RpcRequest, RpcResponse, LOG_INFO_METHOD};
use crate::storage::{LogStore, NewLogEntry};

/// Reply prefix for a successful `LogInfo` call.
pub const RPC_REPLY_PREFIX: &str = "Processed payload via RPC:";

/// Serves `LogInfo` calls against the log store.
#[derive(Clone)]
pub struct RpcServer {
    store: Arc<dyn LogStore>,
}

impl RpcServer {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Accept connections forever, one task per connection.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        info!(addr = %listener.local_addr()?, "RPC server listening");

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "RPC accept failed");
                    continue;
                }
            };

            let server = self.clone();
            tokio::spawn(async move {
                debug!(peer = %peer, "RPC connection opened");
                if let Err(e) = server.serve_connection(stream).await {
                    warn!(peer = %peer, error = %e, "RPC connection failed");
                }
            });
        }
    }

    /// Answer requests on one connection until the peer hangs up.
    pub async fn serve_connection<S>(&self, stream: S) -> Result<(), RpcError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = rpc::framed(stream);
        loop {
            let request: RpcRequest = match rpc::recv(&mut stream).await {
                Ok(request) => request,
                Err(RpcError::Closed) => return Ok(()),
                Err(e) => return Err(e),
            };
            let response = self.handle(request).await;
            rpc::send(&mut stream, &response).await?;
        }
    }

    /// Execute one request.
    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        if request.method != LOG_INFO_METHOD {
            return RpcResponse::err(request.seq, format!("unknown method {}", request.method));
        }

        let name = request.payload.name;
        match self
            .store
            .insert(NewLogEntry::new(name.clone(), request.payload.data))
            .await
        {
            Ok(id) => {
                info!(id = %id, "log entry written via RPC");
                RpcResponse::ok(request.seq, format!("{}{}", RPC_REPLY_PREFIX, name))
            }
            Err(e) => {
                error!(error = %e, "RPC log write failed");
                RpcResponse::err(request.seq, e.to_string())
            }
        }
    }
}
