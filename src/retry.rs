//! Retry policy wrapped around a single logical HTTP call.
//!
//! Every attempt is first classified into an [`Attempt`]; the executor then either
//! returns, sleeps for `backoff_factor^n` seconds (capped) and tries again, or gives up
//! and annotates the last error with the number of attempts made.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::error::{LLMError, is_retryable_status};
use crate::http::HttpResponse;

/// Jitter applied on top of the exponential delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// Sleep exactly the computed delay.
    #[default]
    None,
    /// Sleep a uniformly random duration in `[0, delay]`.
    Full,
}

/// Outcome of one attempt, as seen by the retry state machine.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    /// Transient failure; `retry_after` carries a server supplied delay hint.
    Retryable {
        error: LLMError,
        retry_after: Option<Duration>,
    },
    Terminal(LLMError),
}

impl<T> Attempt<T> {
    /// Chains a further classification step onto a successful attempt.
    pub fn and_then<U, F>(self, f: F) -> Attempt<U>
    where
        F: FnOnce(T) -> Attempt<U>,
    {
        match self {
            Attempt::Success(value) => f(value),
            Attempt::Retryable { error, retry_after } => Attempt::Retryable { error, retry_after },
            Attempt::Terminal(error) => Attempt::Terminal(error),
        }
    }
}

/// Bookkeeping for one [`RetryPolicy::execute`] invocation.
#[derive(Debug, Default)]
struct RetryContext {
    attempts: u32,
    elapsed_backoff: Duration,
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_factor: f64,
    max_backoff: Duration,
    jitter: Jitter,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 5;
    pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
    pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

    /// Creates a policy without jitter.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Configuration`] when `backoff_factor` is not a positive finite
    /// number or `max_backoff` is zero.
    pub fn new(
        max_retries: u32,
        backoff_factor: f64,
        max_backoff: Duration,
    ) -> Result<Self, LLMError> {
        if !backoff_factor.is_finite() || backoff_factor <= 0.0 {
            return Err(LLMError::configuration(
                "backoff_factor",
                format!("must be a positive number, got {backoff_factor}"),
            ));
        }
        if max_backoff.is_zero() {
            return Err(LLMError::configuration("max_backoff", "must be positive"));
        }
        Ok(Self {
            max_retries,
            backoff_factor,
            max_backoff,
            jitter: Jitter::None,
        })
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Deterministic delay before retry `retry` (1-based): `backoff_factor^retry`
    /// seconds, capped at `max_backoff`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use llm_connectors::retry::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(3, 2.0, Duration::from_secs(60)).unwrap();
    /// assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    /// assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    /// assert_eq!(policy.delay_for(10), Duration::from_secs(60));
    /// ```
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.backoff_factor.powi(exponent);
        let cap = self.max_backoff.as_secs_f64();
        if !secs.is_finite() || secs >= cap {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Delay actually slept before retry `retry`.
    ///
    /// Jitter applies to the computed backoff only; a server hint is a floor that the
    /// jittered value cannot go below (the cap still wins).
    fn sleep_duration(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let computed = self.delay_for(retry);
        let delay = match self.jitter {
            Jitter::None => computed,
            Jitter::Full => {
                let secs = rand::thread_rng().gen_range(0.0..=computed.as_secs_f64());
                Duration::from_secs_f64(secs)
            }
        };
        match retry_after {
            Some(hint) => delay.max(hint.min(self.max_backoff)),
            None => delay,
        }
    }

    /// Runs `operation` until it succeeds, fails terminally, or `max_retries + 1`
    /// attempts have been made.
    ///
    /// Retries are strictly sequential; the only suspension points are the operation
    /// itself and the backoff sleep.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, LLMError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut ctx = RetryContext::default();
        loop {
            ctx.attempts += 1;
            debug!(attempt = ctx.attempts, "issuing request attempt");
            let (err, retry_after) = match operation().await {
                Attempt::Success(value) => return Ok(value),
                Attempt::Terminal(err) => {
                    error!(attempt = ctx.attempts, error = %err, "request failed with non-retryable error");
                    return Err(err.with_attempts(ctx.attempts));
                }
                Attempt::Retryable { error, retry_after } => (error, retry_after),
            };

            if ctx.attempts > self.max_retries {
                error!(
                    attempts = ctx.attempts,
                    backoff_ms = ctx.elapsed_backoff.as_millis() as u64,
                    error = %err,
                    "request failed after exhausting retries"
                );
                return Err(err.with_attempts(ctx.attempts));
            }

            let delay = self.sleep_duration(ctx.attempts, retry_after);
            warn!(
                attempt = ctx.attempts,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
            sleep(delay).await;
            ctx.elapsed_backoff += delay;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            backoff_factor: Self::DEFAULT_BACKOFF_FACTOR,
            max_backoff: Self::DEFAULT_MAX_BACKOFF,
            jitter: Jitter::None,
        }
    }
}

/// Maps the result of one transport call onto an [`Attempt`].
///
/// 2xx responses succeed. 429 and 5xx are retryable, other statuses are terminal; both
/// become [`LLMError::Provider`] with the message pulled out of the body by
/// `extract_message`. Transport failures keep their own classification.
pub fn classify_response(
    provider: &'static str,
    result: Result<HttpResponse, LLMError>,
    extract_message: fn(&str) -> Option<String>,
) -> Attempt<HttpResponse> {
    let response = match result {
        Ok(response) => response,
        Err(err) if err.is_retryable() => {
            return Attempt::Retryable {
                error: err,
                retry_after: None,
            };
        }
        Err(err) => return Attempt::Terminal(err),
    };

    if (200..300).contains(&response.status) {
        return Attempt::Success(response);
    }

    let status = response.status;
    let retry_after = if status == 429 {
        retry_after_from_headers(&response.headers)
    } else {
        None
    };
    let body = String::from_utf8_lossy(&response.body).into_owned();
    let message = extract_message(&body).unwrap_or_else(|| format!("status {status}"));
    let error = LLMError::Provider {
        provider,
        status,
        message,
        body,
        attempts: 1,
    };

    if is_retryable_status(status) {
        Attempt::Retryable { error, retry_after }
    } else {
        Attempt::Terminal(error)
    }
}

/// Extracts the `Retry-After` header (in seconds) if present.
///
/// HTTP-date values are ignored because vendors primarily use the numeric form.
pub(crate) fn retry_after_from_headers(headers: &HashMap<String, String>) -> Option<Duration> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("retry-after"))
        .and_then(|(_, value)| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
