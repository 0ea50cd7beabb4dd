//! Inbox state machine types.

use std::time::Duration;

use mailfade_api::MessageSummary;

use crate::account::Account;

/// Default inbox lifetime in seconds (10 minutes).
pub const DEFAULT_TTL_SECS: i64 = 10 * 60;

/// Configuration for the inbox lifecycle.
#[derive(Debug, Clone)]
pub struct InboxConfig {
    /// How long a new inbox lives.
    pub ttl: chrono::Duration,
    /// Poll interval while the inbox is empty.
    pub poll_interval_empty: Duration,
    /// Poll interval once messages exist.
    pub poll_interval_active: Duration,
    /// Retries per poll before surfacing the error.
    pub max_poll_retries: u32,
    /// Base delay for exponential backoff between poll retries.
    pub retry_base_delay: Duration,
    /// Upper bound on the backoff delay.
    pub retry_max_delay: Duration,
    /// Length of the generated address local part.
    pub local_part_len: usize,
    /// Length of the generated password.
    pub password_len: usize,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::seconds(DEFAULT_TTL_SECS),
            poll_interval_empty: Duration::from_secs(5),
            poll_interval_active: Duration::from_secs(15),
            max_poll_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(8),
            local_part_len: 12,
            password_len: 20,
        }
    }
}

/// Where the inbox is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxPhase {
    /// No inbox.
    Anonymous,
    /// Provisioning is in flight.
    Creating,
    /// Authenticated and polling.
    Active,
    /// The inbox passed its expiry.
    Expired,
    /// The user deleted the inbox.
    Deleted,
}

impl std::fmt::Display for InboxPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Anonymous => "anonymous",
            Self::Creating => "creating",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// A live inbox: the account plus the cached message list.
#[derive(Debug, Clone)]
pub struct ActiveInbox {
    /// The backing account.
    pub account: Account,
    /// Messages from the last successful poll.
    pub messages: Vec<MessageSummary>,
}

/// The inbox state machine.
///
/// `Anonymous` → `Creating` → `Active` → `Expired`/`Deleted`, and from
/// either terminal state back to `Anonymous` via the next creation.
#[derive(Debug, Clone)]
pub enum InboxState {
    /// No inbox.
    Anonymous,
    /// Provisioning is in flight.
    Creating,
    /// Authenticated and polling.
    Active(ActiveInbox),
    /// The inbox passed its expiry; local state has been cleared.
    Expired {
        /// The address that expired.
        address: String,
    },
    /// The user deleted the inbox.
    Deleted {
        /// The address that was deleted.
        address: String,
    },
}

impl InboxState {
    /// The lifecycle phase this state is in.
    #[must_use]
    pub const fn phase(&self) -> InboxPhase {
        match self {
            Self::Anonymous => InboxPhase::Anonymous,
            Self::Creating => InboxPhase::Creating,
            Self::Active(_) => InboxPhase::Active,
            Self::Expired { .. } => InboxPhase::Expired,
            Self::Deleted { .. } => InboxPhase::Deleted,
        }
    }
}
