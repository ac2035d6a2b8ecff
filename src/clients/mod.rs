//! Downstream service clients.
//!
//! One client per transport, each exposing a single call. Connections are
//! opened per call and every call is bounded by the client's timeout.

use std::time::Duration;

pub mod grpc;
pub mod http;
pub mod rpc;

pub use grpc::GrpcLogClient;
pub use http::HttpClient;
pub use rpc::RpcClient;

/// Errors from downstream calls.
///
/// `Unavailable` is reserved for dial/connect failures so callers can tell an
/// unreachable service apart from one that answered badly.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection to {service} failed: {reason}")]
    Unavailable { service: String, reason: String },

    #[error("{service} did not answer within {after:?}")]
    Timeout { service: String, after: Duration },

    #[error("{service} returned {status}: {message}")]
    Status {
        service: String,
        status: String,
        message: String,
    },

    #[error("{service} rejected the call: {message}")]
    Remote { service: String, message: String },

    #[error("invalid exchange with {service}: {reason}")]
    Protocol { service: String, reason: String },
}

impl ClientError {
    pub(crate) fn unavailable(service: &str, reason: impl ToString) -> Self {
        ClientError::Unavailable {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn timeout(service: &str, after: Duration) -> Self {
        ClientError::Timeout {
            service: service.to_string(),
            after,
        }
    }

    pub(crate) fn protocol(service: &str, reason: impl ToString) -> Self {
        ClientError::Protocol {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }
}
