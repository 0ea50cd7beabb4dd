//! The local persistence layer, grouped behind one handle.

use crate::account::AccountRepository;
use crate::audit::AuditLogRepository;
use crate::cleanup::CleanupLogRepository;
use crate::session::SessionRepository;
use crate::Result;

/// The full local store: accounts, audit log, cleanup log, session.
///
/// Services share a `Store` via `Arc`; each repository owns its pool
/// over the same database file.
pub struct Store {
    accounts: AccountRepository,
    audit: AuditLogRepository,
    cleanup: CleanupLogRepository,
    session: SessionRepository,
}

impl Store {
    /// Open (or create) the store at the given database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn open(database_path: &str) -> Result<Self> {
        Ok(Self {
            accounts: AccountRepository::new(database_path).await?,
            audit: AuditLogRepository::new(database_path).await?,
            cleanup: CleanupLogRepository::new(database_path).await?,
            session: SessionRepository::new(database_path).await?,
        })
    }

    /// In-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        Ok(Self {
            accounts: AccountRepository::in_memory().await?,
            audit: AuditLogRepository::in_memory().await?,
            cleanup: CleanupLogRepository::in_memory().await?,
            session: SessionRepository::in_memory().await?,
        })
    }

    /// In-memory store for tests that run on a paused clock.
    ///
    /// `#[tokio::test(start_paused = true)]` auto-advances the virtual clock to
    /// the next timer whenever the runtime parks. sqlx establishes its first
    /// SQLite connection by awaiting a reply from a background worker thread —
    /// an external wakeup the tokio reactor doesn't track — so the paused clock
    /// jumps straight to the pool's acquire timeout and `connect()` fails with
    /// `PoolTimedOut`. Driving the handshake alongside a task that yields keeps
    /// the scheduler from ever parking, so no timer fires while the real
    /// background thread (on a real clock) completes in microseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    #[cfg(test)]
    pub(crate) async fn in_memory_paused() -> Result<Self> {
        tokio::select! {
            biased;
            result = Self::in_memory() => result,
            () = async { loop { tokio::task::yield_now().await; } } => unreachable!(),
        }
    }

    /// Account storage.
    #[must_use]
    pub const fn accounts(&self) -> &AccountRepository {
        &self.accounts
    }

    /// Audit log storage.
    #[must_use]
    pub const fn audit(&self) -> &AuditLogRepository {
        &self.audit
    }

    /// Cleanup log and stats storage.
    #[must_use]
    pub const fn cleanup(&self) -> &CleanupLogRepository {
        &self.cleanup
    }

    /// Session storage.
    #[must_use]
    pub const fn session(&self) -> &SessionRepository {
        &self.session
    }

    /// Wipe everything: accounts, logs, stats, and the session.
    ///
    /// # Errors
    ///
    /// Returns an error if any delete fails.
    pub async fn reset(&self) -> Result<()> {
        self.accounts.clear().await?;
        self.audit.clear().await?;
        self.cleanup.clear().await?;
        self.session.clear_current().await?;
        Ok(())
    }
}
