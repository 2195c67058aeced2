//! Transport abstraction for opening answer streams

use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use aura_stream::{QueryRequest, Result};
use tokio_stream::Stream;

/// Raw body chunks of an accepted query, in arrival order
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Never retry
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Opens the answer stream for one query
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the query with the bearer token and wait for the response headers.
    ///
    /// Resolves to the body once the server accepted the request (2xx).
    /// A 401 must surface as [`aura_stream::Error::AuthExpired`], any other
    /// non-success status as [`aura_stream::Error::Status`]. The body may
    /// also yield `AuthExpired` if the server revokes the token mid-answer.
    async fn open(&self, request: &QueryRequest, token: &str) -> Result<ByteStream>;
}
