//! Action requests accepted by the gateway.
//!
//! Parsed in two steps: the `{action, payload}` wire form first, then the
//! payload into the variant the action names.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DispatchError;

/// `{"action": "...", "payload": {...}}` as received.
#[derive(Debug, Clone, Deserialize)]
pub struct RawActionRequest {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPayload {
    pub name: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailPayload {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub message: String,
}

/// A validated request; one variant per downstream path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    Auth(AuthPayload),
    /// Log over HTTP.
    Log(LogPayload),
    /// Log over the binary RPC protocol.
    LogRpc(LogPayload),
    /// Log over gRPC.
    LogGrpc(LogPayload),
    /// Publish the entry to the log exchange.
    LogEvent(LogPayload),
    Mail(MailPayload),
}

impl ActionRequest {
    /// Wire name of the action.
    pub fn action(&self) -> &'static str {
        match self {
            ActionRequest::Auth(_) => "auth",
            ActionRequest::Log(_) => "log",
            ActionRequest::LogRpc(_) => "log-rpc",
            ActionRequest::LogGrpc(_) => "log-grpc",
            ActionRequest::LogEvent(_) => "log-event",
            ActionRequest::Mail(_) => "mail",
        }
    }

    /// Parse a request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, DispatchError> {
        let raw: RawActionRequest = serde_json::from_slice(body)
            .map_err(|e| DispatchError::Validation(format!("malformed request: {}", e)))?;
        Self::try_from(raw)
    }
}

fn payload<T: DeserializeOwned>(action: &str, payload: Value) -> Result<T, DispatchError> {
    serde_json::from_value(payload)
        .map_err(|e| DispatchError::Validation(format!("invalid {} payload: {}", action, e)))
}

impl TryFrom<RawActionRequest> for ActionRequest {
    type Error = DispatchError;

    fn try_from(raw: RawActionRequest) -> Result<Self, Self::Error> {
        let action = raw.action.as_str();
        match action {
            "auth" => Ok(ActionRequest::Auth(payload(action, raw.payload)?)),
            "log" => Ok(ActionRequest::Log(payload(action, raw.payload)?)),
            "log-rpc" => Ok(ActionRequest::LogRpc(payload(action, raw.payload)?)),
            "log-grpc" => Ok(ActionRequest::LogGrpc(payload(action, raw.payload)?)),
            "log-event" => Ok(ActionRequest::LogEvent(payload(action, raw.payload)?)),
            "mail" => Ok(ActionRequest::Mail(payload(action, raw.payload)?)),
            _ => Err(DispatchError::UnknownAction(raw.action)),
        }
    }
}
