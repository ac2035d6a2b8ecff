//! Service handlers: the gateway front door, the log-writer servers and the
//! queue listener's event handler.

pub mod gateway;
pub mod listener;
pub mod logger;
