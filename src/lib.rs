//! Switchyard - gateway, log writer and queue listener services
//!
//! The gateway dispatches `{action, payload}` requests to one downstream
//! transport (HTTP, binary RPC, gRPC or the message broker). The logger
//! persists entries behind all three request transports. The listener
//! consumes log events from a topic exchange.

pub mod bus;
pub mod clients;
pub mod config;
pub mod handlers;
pub mod rpc;
pub mod storage;
pub mod utils;

pub mod proto {
    tonic::include_proto!("logs");
}
