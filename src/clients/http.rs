//! JSON-over-HTTP downstream client.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::ClientError;

/// HTTP client for JSON POST calls.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    /// Build a client whose connect and total request time are bounded by `timeout`.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    /// POST `payload` as JSON to `url`.
    ///
    /// Any answer, including non-2xx, is returned as `(status, body)`. The body
    /// is parsed as JSON when possible, otherwise kept as a string.
    pub async fn call_http<T>(
        &self,
        service: &str,
        url: &str,
        payload: &T,
    ) -> Result<(StatusCode, Value), ClientError>
    where
        T: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.classify(service, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.classify(service, e))?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        debug!(service = %service, url = %url, status = %status, "HTTP call completed");

        Ok((status, body))
    }

    fn classify(&self, service: &str, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::timeout(service, self.timeout)
        } else if e.is_connect() || e.is_request() {
            ClientError::unavailable(service, e)
        } else {
            ClientError::protocol(service, e)
        }
    }
}
