//! Session model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// The persisted current-inbox session.
///
/// Enough to resume an inbox across process restarts; the full account
/// record lives in the account store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// The current account.
    pub account_id: AccountId,
    /// Its email address.
    pub address: String,
    /// Bearer token for provider calls.
    pub token: String,
    /// When the inbox expires.
    pub expires_at: DateTime<Utc>,
}
