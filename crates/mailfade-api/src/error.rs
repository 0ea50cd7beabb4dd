//! Error types for provider API operations.

/// Result type alias for provider API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Provider API error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the provider.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider-supplied detail message.
        message: String,
    },

    /// The account no longer exists on the provider.
    ///
    /// Returned for authentication failures on account-scoped endpoints.
    /// Callers treat this as an authoritative expiry signal.
    #[error("Account no longer exists on the provider")]
    AccountGone,

    /// The provider rejected the request due to rate limiting.
    #[error("Rate limited by the provider")]
    RateLimited {
        /// Seconds to wait before retrying, if the provider said.
        retry_after: Option<u64>,
    },

    /// Base URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Creates an API error from a status code and detail message.
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether the error is transient and worth retrying.
    ///
    /// Transport failures, rate limiting, and server-side (5xx) responses
    /// are transient; everything else is authoritative.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_decode(),
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = Error::api(422, "address already in use");
        assert_eq!(
            err.to_string(),
            "API error (422): address already in use"
        );
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(Error::api(500, "boom").is_retryable());
        assert!(Error::api(503, "unavailable").is_retryable());
        assert!(Error::RateLimited { retry_after: None }.is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        assert!(!Error::api(404, "not found").is_retryable());
        assert!(!Error::api(422, "invalid").is_retryable());
        assert!(!Error::AccountGone.is_retryable());
    }
}
