use std::fmt;

use thiserror::Error;

/// Classifies transport-level failures so the retry policy can tell transient network
/// trouble apart from requests that could never be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The per-request timeout elapsed before a response arrived.
    Timeout,
    /// The connection could not be established.
    Connect,
    /// The connection broke while sending the request or reading the body.
    Network,
    /// The request could not be constructed (bad header value, bad URL, ...).
    InvalidRequest,
}

impl TransportErrorKind {
    /// Returns `true` for failures worth another attempt.
    pub fn is_transient(self) -> bool {
        !matches!(self, TransportErrorKind::InvalidRequest)
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Network => "network",
            TransportErrorKind::InvalidRequest => "invalid request",
        };
        f.write_str(label)
    }
}

/// Aggregates every failure mode exposed by the provider clients.
///
/// Each variant is a distinct kind callers can match on: configuration problems are
/// reported at construction, validation problems before any network traffic, and
/// provider/transport failures only after the retry policy gave up.
#[derive(Debug, Error)]
pub enum LLMError {
    /// Raised when building or validating [`crate::config::Settings`] fails.
    #[error("invalid configuration for {field}: {reason}")]
    Configuration {
        /// Name of the configuration field that failed validation.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
    /// Signals invalid call arguments or a payload that could not be serialized.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Non-success HTTP status returned by the provider, or a success body that
    /// could not be understood.
    #[error("provider {provider} returned status {status} after {attempts} attempt(s): {message}")]
    Provider {
        /// Name of the provider, such as `openai`.
        provider: &'static str,
        /// HTTP status code of the last response.
        status: u16,
        /// Human-readable message extracted from the vendor error payload.
        message: String,
        /// Raw response body, kept verbatim for debugging.
        body: String,
        /// Number of attempts made before giving up.
        attempts: u32,
    },
    /// Timeout, connection, or network failure that retries did not resolve.
    #[error("transport error ({kind}) after {attempts} attempt(s): {message}")]
    Transport {
        message: String,
        kind: TransportErrorKind,
        attempts: u32,
    },
    /// The client was closed before the call was issued.
    #[error("client for provider {provider} is closed")]
    ClientClosed { provider: &'static str },
    /// Declares that a capability is not offered by the selected provider.
    #[error("provider {provider} does not support {feature}")]
    NotSupported {
        provider: &'static str,
        feature: &'static str,
    },
}

impl LLMError {
    /// Creates an [`LLMError::Transport`] for a single attempt.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_connectors::error::{LLMError, TransportErrorKind};
    ///
    /// let err = LLMError::transport(TransportErrorKind::Connect, "dns lookup failed");
    /// assert!(err.is_retryable());
    /// assert_eq!(err.attempts(), Some(1));
    /// ```
    pub fn transport<T: Into<String>>(kind: TransportErrorKind, message: T) -> Self {
        Self::Transport {
            message: message.into(),
            kind,
            attempts: 1,
        }
    }

    /// Creates an [`LLMError::Validation`] from a textual description.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::Configuration`] naming the offending field.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_connectors::error::LLMError;
    ///
    /// let err = LLMError::configuration("timeout", "must be positive");
    /// assert_eq!(err.to_string(), "invalid configuration for timeout: must be positive");
    /// ```
    pub fn configuration<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` when the failure is transient: rate limiting, a server error, or
    /// a timeout/connection problem.
    pub fn is_retryable(&self) -> bool {
        match self {
            LLMError::Provider { status, .. } => is_retryable_status(*status),
            LLMError::Transport { kind, .. } => kind.is_transient(),
            _ => false,
        }
    }

    /// HTTP status of a provider failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            LLMError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Number of attempts recorded on network-bound failures.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            LLMError::Provider { attempts, .. } | LLMError::Transport { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }

    /// Stamps the total attempt count on network-bound failures; other variants are
    /// returned unchanged.
    pub(crate) fn with_attempts(mut self, total: u32) -> Self {
        if let LLMError::Provider { attempts, .. } | LLMError::Transport { attempts, .. } =
            &mut self
        {
            *attempts = total;
        }
        self
    }
}

/// HTTP statuses that indicate a transient condition: 429 and every 5xx.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}
