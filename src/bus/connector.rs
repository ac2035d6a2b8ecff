//! Broker connection establishment with bounded backoff.
//!
//! The connector dials the broker until it succeeds or the policy's retry cap
//! is exceeded. Exhaustion is terminal: process entry points treat it as fatal.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::Retryable;
use lapin::{Channel, ConnectionProperties};
use tracing::{error, info, warn};

use super::{BusError, Result};
use crate::utils::retry::BackoffPolicy;

/// Live session with the message broker.
///
/// Owned by the process that created it. `close` consumes the handle, so a
/// connection is closed at most once and cannot be used afterwards.
pub struct Connection {
    inner: lapin::Connection,
}

impl Connection {
    /// Open a new channel. Each role (publisher, consumer) owns its own.
    pub async fn create_channel(&self) -> Result<Channel> {
        self.inner
            .create_channel()
            .await
            .map_err(|e| BusError::Channel(format!("Failed to create channel: {}", e)))
    }

    pub fn is_connected(&self) -> bool {
        self.inner.status().connected()
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        self.inner
            .close(200, "shutdown")
            .await
            .map_err(|e| BusError::Connection(format!("Failed to close connection: {}", e)))?;
        info!("Closed broker connection");
        Ok(())
    }
}

/// Establishes broker connections under a backoff policy.
#[derive(Debug, Clone, Copy)]
pub struct Connector {
    policy: BackoffPolicy,
}

impl Connector {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }

    /// Dial the AMQP broker at `url`, retrying per policy.
    pub async fn connect(&self, url: &str) -> Result<Connection> {
        let inner = self
            .connect_with(|| async move {
                lapin::Connection::connect(url, ConnectionProperties::default())
                    .await
                    .map_err(|e| e.to_string())
            })
            .await?;

        Ok(Connection { inner })
    }

    /// Retry an arbitrary dial function per policy.
    ///
    /// Returns `ConnectionExhausted` once `max_attempts` retries have failed;
    /// no dial is made after that.
    pub async fn connect_with<T, F, Fut>(&self, mut dial: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, String>>,
    {
        let attempts = AtomicU32::new(0);

        let outcome = (|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            dial()
        })
        .retry(self.policy)
        .notify(|err: &String, delay: Duration| {
            warn!(
                error = %err,
                backoff_secs = delay.as_secs(),
                "Broker not yet ready, backing off"
            );
        })
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        match outcome {
            Ok(conn) => {
                info!(attempts, "Connected to broker");
                Ok(conn)
            }
            Err(last_error) => {
                error!(attempts, error = %last_error, "Giving up on broker connection");
                Err(BusError::ConnectionExhausted {
                    attempts,
                    last_error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_quadratic_exhaustion_timing() {
        let connector = Connector::new(BackoffPolicy::Quadratic { max_attempts: 3 });
        let dials = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let counter = dials.clone();
        let result: Result<()> = connector
            .connect_with(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("connection refused".to_string())
                }
            })
            .await;

        // 1 + 4 + 9 seconds of backoff between four dials
        assert_eq!(start.elapsed(), Duration::from_secs(14));
        assert_eq!(dials.load(Ordering::SeqCst), 4);
        match result {
            Err(BusError::ConnectionExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last_error, "connection refused");
            }
            other => panic!("expected ConnectionExhausted, got {:?}", other.err()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_policy_recovers() {
        let connector = Connector::new(BackoffPolicy::Fixed {
            interval_secs: 2,
            max_attempts: 15,
        });
        let dials = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let counter = dials.clone();
        let result = connector
            .connect_with(|| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err("not ready".to_string())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_dial_success_does_not_sleep() {
        let connector = Connector::new(BackoffPolicy::quadratic_default());
        let start = Instant::now();

        let result = connector
            .connect_with(|| async { Ok::<_, String>("conn") })
            .await
            .unwrap();

        assert_eq!(result, "conn");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
