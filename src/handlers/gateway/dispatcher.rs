//! Action dispatcher: one downstream call per validated request.

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::Value;
use tracing::{info, warn};

use super::action::{ActionRequest, AuthPayload, LogPayload, MailPayload};
use crate::bus::{BusError, Event, EventPublisher};
use crate::clients::{ClientError, GrpcLogClient, HttpClient, RpcClient};
use crate::config::DownstreamConfig;
use crate::proto::Log;
use crate::rpc::RpcPayload;
use crate::utils::response::{ActionReply, ActionResponse};

const AUTH_SERVICE: &str = "authentication service";
const LOG_SERVICE: &str = "log service";
const MAIL_SERVICE: &str = "mail service";

/// Errors from dispatching an action. Each maps to one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),

    #[error("unknown action")]
    UnknownAction(String),

    #[error("{0}")]
    DownstreamUnavailable(String),

    #[error("{0}")]
    DownstreamTimeout(String),

    #[error("{0}")]
    DownstreamFailed(String),

    #[error("failed to publish event: {0}")]
    Publish(#[from] BusError),
}

impl From<ClientError> for DispatchError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Unavailable { .. } => DispatchError::DownstreamUnavailable(e.to_string()),
            ClientError::Timeout { .. } => DispatchError::DownstreamTimeout(e.to_string()),
            ClientError::Status { .. } | ClientError::Remote { .. } | ClientError::Protocol { .. } => {
                DispatchError::DownstreamFailed(e.to_string())
            }
        }
    }
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Validation(_) | DispatchError::UnknownAction(_) => {
                StatusCode::BAD_REQUEST
            }
            DispatchError::DownstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::DownstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::DownstreamFailed(_) => StatusCode::BAD_GATEWAY,
            DispatchError::Publish(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `{error: true}` envelope for this failure.
    pub fn into_reply(self) -> ActionReply {
        ActionReply::failure(self.status(), self.to_string())
    }
}

/// Routes each [`ActionRequest`] to exactly one downstream transport.
///
/// No retries: one network call, one translation into an [`ActionReply`].
pub struct ActionDispatcher {
    http: HttpClient,
    rpc: RpcClient,
    grpc: GrpcLogClient,
    publisher: Arc<dyn EventPublisher>,
    downstream: DownstreamConfig,
    log_topic: String,
}

impl ActionDispatcher {
    /// Build the dispatcher; every downstream call is bounded by `downstream.timeout_secs`.
    pub fn new(
        downstream: DownstreamConfig,
        log_topic: impl Into<String>,
        publisher: Arc<dyn EventPublisher>,
    ) -> reqwest::Result<Self> {
        let timeout = downstream.timeout();
        Ok(Self {
            http: HttpClient::new(timeout)?,
            rpc: RpcClient::new(timeout),
            grpc: GrpcLogClient::new(timeout),
            publisher,
            downstream,
            log_topic: log_topic.into(),
        })
    }

    /// Dispatch one request. Never fails: errors become failure envelopes.
    pub async fn dispatch(&self, request: ActionRequest) -> ActionReply {
        let action = request.action();

        let result = match request {
            ActionRequest::Auth(payload) => self.authenticate(payload).await,
            ActionRequest::Log(payload) => self.log_via_http(payload).await,
            ActionRequest::LogRpc(payload) => self.log_via_rpc(payload).await,
            ActionRequest::LogGrpc(payload) => self.log_via_grpc(payload).await,
            ActionRequest::LogEvent(payload) => self.log_via_event(payload).await,
            ActionRequest::Mail(payload) => self.send_mail(payload).await,
        };

        match result {
            Ok(reply) => {
                info!(action, status = %reply.status, "action dispatched");
                reply
            }
            Err(e) => {
                warn!(action, error = %e, "action failed");
                e.into_reply()
            }
        }
    }

    async fn authenticate(&self, payload: AuthPayload) -> Result<ActionReply, DispatchError> {
        let (status, body) = self
            .http
            .call_http(AUTH_SERVICE, &self.downstream.auth_url, &payload)
            .await?;

        // The auth service's status is kept whatever the body looks like
        match serde_json::from_value::<ActionResponse>(body.clone()) {
            Ok(envelope) => Ok(ActionReply::new(status, envelope)),
            Err(_) if status.is_success() => Ok(ActionReply::new(
                status,
                ActionResponse::ok("authenticated").with_data(body),
            )),
            Err(_) => {
                let message = match body_message(&body) {
                    m if m.is_empty() => format!("{} returned {}", AUTH_SERVICE, status),
                    m => m,
                };
                Ok(ActionReply::failure(status, message))
            }
        }
    }

    async fn log_via_http(&self, payload: LogPayload) -> Result<ActionReply, DispatchError> {
        let (status, body) = self
            .http
            .call_http(LOG_SERVICE, &self.downstream.log_url, &payload)
            .await?;
        if !status.is_success() {
            return Err(rejected(LOG_SERVICE, status, &body));
        }
        Ok(ActionReply::accepted("logged"))
    }

    async fn log_via_rpc(&self, payload: LogPayload) -> Result<ActionReply, DispatchError> {
        let reply = self
            .rpc
            .call_rpc(
                &self.downstream.log_rpc_addr,
                RpcPayload {
                    name: payload.name,
                    data: payload.data,
                },
            )
            .await?;
        Ok(ActionReply::accepted(reply))
    }

    async fn log_via_grpc(&self, payload: LogPayload) -> Result<ActionReply, DispatchError> {
        let result = self
            .grpc
            .call_grpc(
                &self.downstream.log_grpc_addr,
                Log {
                    name: payload.name,
                    data: payload.data,
                },
            )
            .await?;
        Ok(ActionReply::accepted(result))
    }

    async fn log_via_event(&self, payload: LogPayload) -> Result<ActionReply, DispatchError> {
        let event = Event::new(payload.name, payload.data);
        self.publisher.publish(&self.log_topic, &event).await?;
        Ok(ActionReply::accepted("logged via RabbitMQ"))
    }

    async fn send_mail(&self, payload: MailPayload) -> Result<ActionReply, DispatchError> {
        let (status, body) = self
            .http
            .call_http(MAIL_SERVICE, &self.downstream.mail_url, &payload)
            .await?;
        if !status.is_success() {
            return Err(rejected(MAIL_SERVICE, status, &body));
        }
        Ok(ActionReply::accepted(format!("Message sent to {}", payload.to)))
    }
}

/// Human-readable text of a downstream response body.
fn body_message(body: &Value) -> String {
    match body {
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Failure for a downstream that answered with a non-2xx status.
fn rejected(service: &str, status: StatusCode, body: &Value) -> DispatchError {
    DispatchError::from(ClientError::Status {
        service: service.to_string(),
        status: status.to_string(),
        message: body_message(body),
    })
}
