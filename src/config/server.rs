//! Per-process server configuration types.

use std::time::Duration;

use serde::Deserialize;

use crate::bus::{default_log_topics, TOPIC_LOG_INFO};
use crate::utils::retry::BackoffPolicy;

/// Gateway (broker service) configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Downstream endpoints the dispatcher calls.
    pub downstream: DownstreamConfig,
    /// Broker connection backoff.
    pub backoff: BackoffPolicy,
    /// Routing key for `log-event` actions.
    pub log_topic: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            downstream: DownstreamConfig::default(),
            backoff: BackoffPolicy::fixed_default(),
            log_topic: TOPIC_LOG_INFO.to_string(),
        }
    }
}

/// Addresses of the services the gateway forwards to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownstreamConfig {
    pub auth_url: String,
    pub log_url: String,
    pub mail_url: String,
    /// `host:port` of the logger's RPC server.
    pub log_rpc_addr: String,
    /// `host:port` of the logger's gRPC server.
    pub log_grpc_addr: String,
    /// Bound on every downstream call.
    pub timeout_secs: u64,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            auth_url: "http://authentication-service/authenticate".to_string(),
            log_url: "http://logger-service/log".to_string(),
            mail_url: "http://mailer-service/send".to_string(),
            log_rpc_addr: "logger-service:5001".to_string(),
            log_grpc_addr: "logger-service:50001".to_string(),
            timeout_secs: 10,
        }
    }
}

impl DownstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where the listener hands consumed log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkType {
    /// Write straight into the configured storage. Only useful with a shared
    /// backend such as MongoDB.
    Storage,
    /// POST each entry to the logger's HTTP endpoint.
    #[default]
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    #[serde(rename = "type")]
    pub sink_type: SinkType,
    /// Logger endpoint used by the HTTP sink.
    pub url: String,
    /// Bound on each HTTP sink call.
    pub timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            sink_type: SinkType::Http,
            url: "http://logger-service/log".to_string(),
            timeout_secs: 10,
        }
    }
}

impl SinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Queue listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Binding patterns for the listener queue.
    pub topics: Vec<String>,
    pub backoff: BackoffPolicy,
    pub sink: SinkConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            topics: default_log_topics(),
            backoff: BackoffPolicy::quadratic_default(),
            sink: SinkConfig::default(),
        }
    }
}

/// Logger (log-writer service) ports.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub host: String,
    pub web_port: u16,
    pub rpc_port: u16,
    pub grpc_port: u16,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            web_port: 8082,
            rpc_port: 5001,
            grpc_port: 50001,
        }
    }
}
