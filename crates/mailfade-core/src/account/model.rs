//! Account model types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Provider-assigned identifier for an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    /// Create a new account ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A locally tracked disposable account.
///
/// The expiry time is immutable once set except through
/// [`Account::extend`]; a deleted account is never un-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Provider-assigned identifier.
    pub id: AccountId,
    /// Full email address.
    pub address: String,
    /// Generated password.
    pub password: String,
    /// Bearer token for authenticated provider calls.
    pub token: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
    /// Whether the remote account has been deleted.
    pub deleted: bool,
    /// Last time the inbox was accessed, if ever.
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// Message count at the last access.
    pub message_count: u32,
    /// Number of failed cleanup passes against this account.
    pub cleanup_attempts: u32,
}

impl Account {
    /// Create a freshly provisioned account.
    #[must_use]
    pub const fn new(
        id: AccountId,
        address: String,
        password: String,
        token: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            address,
            password,
            token,
            created_at,
            expires_at,
            deleted: false,
            last_accessed_at: None,
            message_count: 0,
            cleanup_attempts: 0,
        }
    }

    /// Whether the account is past its expiry time.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the account should be picked up by a cleanup sweep.
    ///
    /// A candidate is not yet deleted and is either expired or older
    /// than the retention window.
    #[must_use]
    pub fn is_cleanup_candidate(&self, now: DateTime<Utc>, max_retention: Duration) -> bool {
        !self.deleted && (self.is_expired(now) || self.created_at <= now - max_retention)
    }

    /// Time left before expiry, clamped to zero.
    #[must_use]
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        std::cmp::max(self.expires_at - now, Duration::zero())
    }

    /// Push the expiry forward. The one sanctioned expiry mutation.
    pub fn extend(&mut self, extra: Duration) {
        self.expires_at += extra;
    }
}
