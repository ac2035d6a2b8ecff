//! JSON response envelope shared by every HTTP front end.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{error, message, data?}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub error: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// An envelope together with the HTTP status it is sent with.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReply {
    pub status: StatusCode,
    pub body: ActionResponse,
}

impl ActionReply {
    pub fn new(status: StatusCode, body: ActionResponse) -> Self {
        Self { status, body }
    }

    /// 202 with `{error: false, message}`.
    pub fn accepted(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ACCEPTED, ActionResponse::ok(message))
    }

    /// `{error: true, message}` with the given status.
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, ActionResponse::failure(message))
    }

    pub fn is_error(&self) -> bool {
        self.body.error
    }
}

impl IntoResponse for ActionReply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
