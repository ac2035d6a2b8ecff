//! Binary RPC protocol between the gateway and the logger.
//!
//! Each message is one length-delimited frame holding a `bitcode` encoded
//! request or response. A connection carries any number of sequential calls;
//! `seq` ties a response to its request.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// The one method the logger exposes.
pub const LOG_INFO_METHOD: &str = "RPCServer.LogInfo";

/// Largest accepted frame.
const MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Errors on the RPC wire.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("RPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RPC codec error: {0}")]
    Codec(#[from] bitcode::Error),

    #[error("RPC connection closed")]
    Closed,
}

/// `LogInfo` argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcPayload {
    pub name: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub seq: u64,
    pub method: String,
    pub payload: RpcPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub seq: u64,
    pub reply: String,
    pub error: Option<String>,
}

impl RpcResponse {
    pub fn ok(seq: u64, reply: impl Into<String>) -> Self {
        Self {
            seq,
            reply: reply.into(),
            error: None,
        }
    }

    pub fn err(seq: u64, error: impl Into<String>) -> Self {
        Self {
            seq,
            reply: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Framed RPC stream.
pub type RpcStream<S> = Framed<S, LengthDelimitedCodec>;

/// Wrap a byte stream in the RPC framing.
pub fn framed<S: AsyncRead + AsyncWrite>(stream: S) -> RpcStream<S> {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_framed(stream)
}

/// Encode and write one message.
pub async fn send<S, T>(stream: &mut RpcStream<S>, message: &T) -> Result<(), RpcError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = bitcode::serialize(message)?;
    stream.send(Bytes::from(bytes)).await?;
    Ok(())
}

/// Read and decode one message. `Closed` when the peer hung up.
pub async fn recv<S, T>(stream: &mut RpcStream<S>) -> Result<T, RpcError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: DeserializeOwned,
{
    match stream.next().await {
        Some(frame) => Ok(bitcode::deserialize(&frame?)?),
        None => Err(RpcError::Closed),
    }
}
