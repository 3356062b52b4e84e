//! Error types shared across agrimedia.
//!
//! [`MediaError`] is produced at the HTTP boundary from explicit transport
//! discriminants (status codes, timeouts, connect failures) and is classified
//! exhaustively into an [`ErrorClassification`] that drives the retry loop and
//! the orchestration fallback chain.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Common error type for agrimedia.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MediaError {
    /// The provider rejected our credentials.
    #[error("Authentication failed for {provider} (HTTP {status})")]
    AuthenticationFailed { provider: String, status: u16 },

    /// The provider (or our local quota window) refused the request.
    #[error("Quota exceeded for {provider}")]
    QuotaExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The provider answered with a server error or is otherwise unavailable.
    #[error("Provider {provider} unavailable{}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    ProviderUnavailable { provider: String, status: Option<u16> },

    /// DNS, connect, or transport level failure.
    #[error("Network error talking to {provider}: {message}")]
    Network { provider: String, message: String },

    /// The outbound call did not finish within the configured timeout.
    #[error("Request to {provider} timed out after {after_ms}ms")]
    Timeout { provider: String, after_ms: u64 },

    /// The provider answered 2xx but the body could not be decoded.
    #[error("Malformed response from {provider}: {message}")]
    Decode { provider: String, message: String },

    /// A cache operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The service is misconfigured (missing key, disabled provider, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MediaError {
    /// Create a new QuotaExceeded error with no retry hint.
    pub fn quota_exceeded<S: Into<String>>(provider: S) -> Self {
        Self::QuotaExceeded {
            provider: provider.into(),
            retry_after_secs: None,
        }
    }

    /// Create a new Network error.
    pub fn network<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        Self::Network {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a new Cache error.
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Name of the provider involved, when the error came from one.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::AuthenticationFailed { provider, .. }
            | Self::QuotaExceeded { provider, .. }
            | Self::ProviderUnavailable { provider, .. }
            | Self::Network { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Decode { provider, .. } => Some(provider),
            Self::Cache(_) | Self::Validation(_) | Self::Configuration(_) => None,
        }
    }

    /// Classify this error into its code, retryability, and fallback strategy.
    pub fn classify(&self) -> ErrorClassification {
        let (code, retryable, fallback) = match self {
            Self::AuthenticationFailed { .. } => (
                ErrorCode::AuthenticationFailed,
                false,
                FallbackStrategy::SwitchProvider,
            ),
            Self::QuotaExceeded { .. } => (
                ErrorCode::QuotaExceeded,
                true,
                FallbackStrategy::SwitchProvider,
            ),
            Self::ProviderUnavailable { .. } => (
                ErrorCode::ProviderUnavailable,
                true,
                FallbackStrategy::SwitchProvider,
            ),
            Self::Network { .. } | Self::Timeout { .. } => {
                (ErrorCode::NetworkError, true, FallbackStrategy::UseCache)
            }
            // A body we cannot parse will not parse on the next attempt either.
            Self::Decode { .. } => (
                ErrorCode::ProviderUnavailable,
                false,
                FallbackStrategy::SwitchProvider,
            ),
            Self::Cache(_) => (ErrorCode::CacheError, true, FallbackStrategy::SwitchProvider),
            Self::Validation(_) => (
                ErrorCode::ValidationError,
                false,
                FallbackStrategy::UseStatic,
            ),
            Self::Configuration(_) => (
                ErrorCode::ConfigurationError,
                false,
                FallbackStrategy::UseStatic,
            ),
        };

        ErrorClassification {
            code,
            retryable,
            fallback,
        }
    }
}

/// Stable error codes used in metrics, alerts, and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AuthenticationFailed,
    QuotaExceeded,
    ProviderUnavailable,
    NetworkError,
    CacheError,
    ValidationError,
    ConfigurationError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationFailed => write!(f, "authentication_failed"),
            Self::QuotaExceeded => write!(f, "quota_exceeded"),
            Self::ProviderUnavailable => write!(f, "provider_unavailable"),
            Self::NetworkError => write!(f, "network_error"),
            Self::CacheError => write!(f, "cache_error"),
            Self::ValidationError => write!(f, "validation_error"),
            Self::ConfigurationError => write!(f, "configuration_error"),
        }
    }
}

/// What the caller should do once retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Serve a previously cached value if one exists.
    UseCache,
    /// Move on to the next provider in priority order.
    SwitchProvider,
    /// Serve the bundled static asset.
    UseStatic,
}

/// Result of [`MediaError::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub code: ErrorCode,
    pub retryable: bool,
    pub fallback: FallbackStrategy,
}

/// Result type alias using the common error type.
pub type Result<T> = std::result::Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MediaError::AuthenticationFailed {
            provider: "pexels".into(),
            status: 401,
        };
        assert_eq!(err.to_string(), "Authentication failed for pexels (HTTP 401)");

        let err = MediaError::ProviderUnavailable {
            provider: "unsplash".into(),
            status: Some(503),
        };
        assert_eq!(err.to_string(), "Provider unsplash unavailable (HTTP 503)");

        let err = MediaError::ProviderUnavailable {
            provider: "unsplash".into(),
            status: None,
        };
        assert_eq!(err.to_string(), "Provider unsplash unavailable");

        let err = MediaError::cache("disabled");
        assert_eq!(err.to_string(), "Cache error: disabled");
    }

    #[test]
    fn test_classification_table() {
        let auth = MediaError::AuthenticationFailed {
            provider: "a".into(),
            status: 403,
        }
        .classify();
        assert_eq!(auth.code, ErrorCode::AuthenticationFailed);
        assert!(!auth.retryable);
        assert_eq!(auth.fallback, FallbackStrategy::SwitchProvider);

        let quota = MediaError::quota_exceeded("a").classify();
        assert!(quota.retryable);
        assert_eq!(quota.fallback, FallbackStrategy::SwitchProvider);

        let timeout = MediaError::Timeout {
            provider: "a".into(),
            after_ms: 10_000,
        }
        .classify();
        assert_eq!(timeout.code, ErrorCode::NetworkError);
        assert!(timeout.retryable);
        assert_eq!(timeout.fallback, FallbackStrategy::UseCache);

        let unavailable = MediaError::ProviderUnavailable {
            provider: "a".into(),
            status: Some(502),
        }
        .classify();
        assert!(unavailable.retryable);
        assert_eq!(unavailable.fallback, FallbackStrategy::SwitchProvider);

        let cache = MediaError::cache("x").classify();
        assert!(cache.retryable);
        assert_eq!(cache.fallback, FallbackStrategy::SwitchProvider);

        let validation = MediaError::validation("bad").classify();
        assert!(!validation.retryable);
        assert_eq!(validation.fallback, FallbackStrategy::UseStatic);

        let config = MediaError::configuration("no key").classify();
        assert!(!config.retryable);
        assert_eq!(config.fallback, FallbackStrategy::UseStatic);
    }

    #[test]
    fn test_provider_accessor() {
        assert_eq!(MediaError::network("pexels", "dns").provider(), Some("pexels"));
        assert_eq!(MediaError::validation("x").provider(), None);
    }

    #[test]
    fn test_error_code_display_matches_serde() {
        for code in [
            ErrorCode::AuthenticationFailed,
            ErrorCode::QuotaExceeded,
            ErrorCode::ProviderUnavailable,
            ErrorCode::NetworkError,
            ErrorCode::CacheError,
            ErrorCode::ValidationError,
            ErrorCode::ConfigurationError,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{code}\""));
        }
    }
}
