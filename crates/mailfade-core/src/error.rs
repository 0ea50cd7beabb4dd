//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote provider call failed.
    #[error("Provider error: {0}")]
    Api(#[from] mailfade_api::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No active, non-private sending domain is available.
    #[error("No sending domains are currently available")]
    NoDomainsAvailable,

    /// Operation is not valid in the current inbox state.
    #[error("Invalid inbox state: {0}")]
    InvalidState(&'static str),
}

impl Error {
    /// Whether the underlying cause is the provider reporting the
    /// account as gone.
    #[must_use]
    pub const fn is_account_gone(&self) -> bool {
        matches!(self, Self::Api(mailfade_api::Error::AccountGone))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
