//! Shared helpers: process bootstrap, backoff policies and the response envelope.

pub mod bootstrap;
pub mod response;
pub mod retry;
