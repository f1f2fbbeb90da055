//! Retry logic with exponential backoff for network failures
//!
//! Only transport-level failures are retried. HTTP error responses are
//! returned to the caller untouched.

use std::sync::Arc;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::http::error::connection_error;
use crate::http::transport::{RawResponse, RequestOptions, Transport, TransportFailure};

/// Invoked once when a request succeeds after at least one retry, with the
/// first failure and the successful response
pub type RetryCallback = Arc<dyn Fn(&TransportFailure, &RawResponse) + Send + Sync>;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy allowing `max_retries` retries
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Create an exponential backoff instance
    pub fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            current_interval: self.initial_delay,
            initial_interval: self.initial_delay,
            max_interval: self.max_delay,
            multiplier: self.multiplier,
            max_elapsed_time: None, // attempts are bounded by max_retries
            ..Default::default()
        };

        if !self.jitter {
            backoff.randomization_factor = 0.0;
        }

        backoff
    }
}

/// Decision on whether to retry a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified delay
    Retry { delay: Duration },
    /// Do not retry the request
    NoRetry,
}

/// Retry state for one logical call
#[derive(Debug)]
pub struct RetryHandler {
    policy: RetryPolicy,
    attempts: u32,
    backoff: ExponentialBackoff,
}

impl RetryHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        let backoff = policy.create_backoff();
        Self {
            policy,
            attempts: 0,
            backoff,
        }
    }

    /// Determine if a request should be retried after `failure`
    pub fn should_retry(&mut self, failure: &TransportFailure) -> RetryDecision {
        if self.attempts >= self.policy.max_retries {
            return RetryDecision::NoRetry;
        }

        if !failure.is_retryable() {
            return RetryDecision::NoRetry;
        }

        self.attempts += 1;

        let delay = self
            .backoff
            .next_backoff()
            .unwrap_or(self.policy.max_delay)
            .min(self.policy.max_delay);

        RetryDecision::Retry { delay }
    }

    /// Number of retries performed so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Run `options` through `transport`, retrying network failures per `policy`.
///
/// The same options, including any idempotency key header, are sent on
/// every attempt. Any HTTP response, successful or not, ends the loop.
pub async fn execute_with_retry(
    transport: &dyn Transport,
    options: &RequestOptions,
    policy: &RetryPolicy,
    on_successful_retry: Option<&RetryCallback>,
    cancel: &CancellationToken,
) -> Result<RawResponse> {
    let mut handler = RetryHandler::new(policy.clone());
    let mut first_failure: Option<TransportFailure> = None;

    loop {
        debug!(
            method = %options.method,
            url = %options.url,
            attempt = handler.attempts() + 1,
            "Dispatching request"
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = transport.execute(options) => outcome,
        };

        match outcome {
            Ok(response) => {
                if let Some(failure) = &first_failure {
                    if response.is_success() {
                        info!(
                            retries = handler.attempts(),
                            status = response.status,
                            "Request succeeded after retry"
                        );
                        if let Some(callback) = on_successful_retry {
                            callback(failure, &response);
                        }
                    }
                }
                return Ok(response);
            }
            Err(failure) => match handler.should_retry(&failure) {
                RetryDecision::Retry { delay } => {
                    warn!(
                        attempt = handler.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        category = failure.category(),
                        "Request failed, retrying: {}",
                        failure.detail()
                    );
                    first_failure.get_or_insert(failure);

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::NoRetry => {
                    error!(
                        retries = handler.attempts(),
                        category = failure.category(),
                        "Request failed, not retrying: {}",
                        failure.detail()
                    );
                    let api_base = options.url.origin().ascii_serialization();
                    return Err(connection_error(&failure, &api_base, handler.attempts()));
                }
            },
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
