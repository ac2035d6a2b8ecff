//! Gateway (broker service) HTTP front door.
//!
//! Accepts `{action, payload}` requests on `POST /handle` and hands them to
//! the [`ActionDispatcher`], which forwards each to exactly one downstream
//! transport and answers with the `{error, message, data?}` envelope.

mod action;
mod dispatcher;

pub use action::{ActionRequest, AuthPayload, LogPayload, MailPayload, RawActionRequest};
pub use dispatcher::{ActionDispatcher, DispatchError};

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::utils::response::{ActionReply, ActionResponse};

#[cfg(test)]
mod tests;

type AppState = Arc<ActionDispatcher>;

/// Build the gateway router.
pub fn router(dispatcher: Arc<ActionDispatcher>) -> Router {
    Router::new()
        .route("/", get(broker).post(broker))
        .route("/ping", get(ping))
        .route("/handle", post(handle_submission))
        .route("/log-grpc", post(log_via_grpc))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(dispatcher)
}

/// Any `http://` or `https://` origin, with credentials.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin.as_bytes().starts_with(b"http://") || origin.as_bytes().starts_with(b"https://")
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers([header::LINK])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300))
}

async fn broker() -> ActionReply {
    ActionReply::new(StatusCode::OK, ActionResponse::ok("Hit the broker"))
}

async fn ping() -> &'static str {
    "."
}

async fn handle_submission(State(dispatcher): State<AppState>, body: Bytes) -> ActionReply {
    match ActionRequest::from_slice(&body) {
        Ok(request) => dispatcher.dispatch(request).await,
        Err(e) => {
            warn!(error = %e, "rejected action request");
            e.into_reply()
        }
    }
}

/// Body of `POST /log-grpc`; any `action` field is ignored.
#[derive(Deserialize)]
struct GrpcLogSubmission {
    payload: LogPayload,
}

async fn log_via_grpc(State(dispatcher): State<AppState>, body: Bytes) -> ActionReply {
    match serde_json::from_slice::<GrpcLogSubmission>(&body) {
        Ok(submission) => {
            dispatcher
                .dispatch(ActionRequest::LogGrpc(submission.payload))
                .await
        }
        Err(e) => {
            warn!(error = %e, "rejected gRPC log request");
            DispatchError::Validation(format!("malformed request: {}", e)).into_reply()
        }
    }
}
