//! Cleanup model types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// Default interval between scheduled sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// Default delay before the startup sweep.
pub const DEFAULT_STARTUP_DELAY_SECS: u64 = 10;

/// Default retention window in days.
pub const DEFAULT_MAX_RETENTION_DAYS: i64 = 7;

/// Configuration for the cleanup scheduler.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Interval between scheduled sweeps.
    pub sweep_interval: Duration,
    /// Delay before the sweep that runs shortly after startup.
    pub startup_delay: Duration,
    /// Number of accounts processed concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches, bounding the request rate.
    pub batch_pause: Duration,
    /// Remote deletion attempts per candidate per sweep.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub retry_base_delay: Duration,
    /// Upper bound on the backoff delay.
    pub retry_max_delay: Duration,
    /// Accounts older than this are swept even if unexpired.
    pub max_retention_days: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            startup_delay: Duration::from_secs(DEFAULT_STARTUP_DELAY_SECS),
            batch_size: 5,
            batch_pause: Duration::from_secs(1),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(10),
            max_retention_days: DEFAULT_MAX_RETENTION_DAYS,
        }
    }
}

/// Result of one cleanup sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Candidates found by the scan.
    pub scanned: usize,
    /// Accounts successfully deleted (or already gone remotely).
    pub deleted: usize,
    /// Accounts whose deletion attempts were exhausted.
    pub failed: usize,
    /// Wall-clock duration of the sweep in milliseconds.
    pub duration_ms: u64,
}

/// Per-attempt record written by the sweep.
///
/// Kept separate from the audit log; this is the cleanup-specific ring
/// of attempt outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupAttempt {
    /// Row identifier.
    pub id: i64,
    /// The account the attempt targeted.
    pub account_id: AccountId,
    /// When the attempt finished.
    pub at: DateTime<Utc>,
    /// Why the account was a candidate (e.g. `expired`, `retention`).
    pub reason: String,
    /// Whether the remote deletion succeeded.
    pub success: bool,
    /// Error text when it did not.
    pub error: Option<String>,
}

/// Aggregate counters over the stored accounts.
///
/// A snapshot recomputed after each sweep, not an incrementally
/// maintained tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    /// All locally known accounts.
    pub total_accounts: u64,
    /// Accounts past expiry but not yet deleted.
    pub expired_accounts: u64,
    /// Accounts marked deleted.
    pub deleted_accounts: u64,
    /// Accounts with at least one failed cleanup pass.
    pub failed_accounts: u64,
    /// When the last sweep ran.
    pub last_run_at: Option<DateTime<Utc>>,
}
