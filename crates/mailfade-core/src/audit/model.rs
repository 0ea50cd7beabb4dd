//! Audit log model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// Lifecycle action recorded against an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    /// Account was created.
    Created,
    /// Inbox was accessed and new mail arrived.
    Accessed,
    /// Account passed its expiry time.
    Expired,
    /// Remote account was deleted.
    Deleted,
    /// A cleanup pass started against the account.
    CleanupAttempted,
    /// A cleanup pass exhausted its retries.
    CleanupFailed,
}

impl AuditAction {
    /// Stable storage tag for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Accessed => "ACCESSED",
            Self::Expired => "EXPIRED",
            Self::Deleted => "DELETED",
            Self::CleanupAttempted => "CLEANUP_ATTEMPTED",
            Self::CleanupFailed => "CLEANUP_FAILED",
        }
    }

    /// Parse a storage tag back into an action.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATED" => Some(Self::Created),
            "ACCESSED" => Some(Self::Accessed),
            "EXPIRED" => Some(Self::Expired),
            "DELETED" => Some(Self::Deleted),
            "CLEANUP_ATTEMPTED" => Some(Self::CleanupAttempted),
            "CLEANUP_FAILED" => Some(Self::CleanupFailed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of a lifecycle event for an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Row identifier, monotonically increasing in insertion order.
    pub id: i64,
    /// The account the event concerns.
    pub account_id: AccountId,
    /// What happened.
    pub action: AuditAction,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Optional free-text detail.
    pub detail: Option<String>,
}
