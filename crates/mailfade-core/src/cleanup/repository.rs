//! Cleanup log and stats snapshot storage.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::warn;

use super::model::{CleanupAttempt, CleanupStats};
use crate::{AccountId, Result};

/// Default maximum number of retained cleanup attempts.
pub const DEFAULT_MAX_ATTEMPTS_RETAINED: u32 = 200;

/// Repository for the capped cleanup-attempt ring and the stats snapshot.
pub struct CleanupLogRepository {
    pool: SqlitePool,
    max_entries: u32,
}

impl CleanupLogRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self {
            pool,
            max_entries: DEFAULT_MAX_ATTEMPTS_RETAINED,
        };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self {
            pool,
            max_entries: DEFAULT_MAX_ATTEMPTS_RETAINED,
        };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Sets the retention cap for the attempt ring.
    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: u32) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS cleanup_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                reason TEXT NOT NULL,
                success INTEGER NOT NULL,
                error TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS cleanup_stats (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                total_accounts INTEGER NOT NULL,
                expired_accounts INTEGER NOT NULL,
                deleted_accounts INTEGER NOT NULL,
                failed_accounts INTEGER NOT NULL,
                last_run_at TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record one cleanup attempt, evicting the oldest beyond the cap.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn record(
        &self,
        account_id: &AccountId,
        reason: &str,
        success: bool,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO cleanup_log (account_id, created_at, reason, success, error)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(account_id.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(reason)
        .bind(success)
        .bind(error)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            DELETE FROM cleanup_log
            WHERE id NOT IN (SELECT id FROM cleanup_log ORDER BY id DESC LIMIT ?)
            ",
        )
        .bind(i64::from(self.max_entries))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The most recent attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn recent(&self, limit: u32) -> Result<Vec<CleanupAttempt>> {
        let rows = sqlx::query("SELECT * FROM cleanup_log ORDER BY id DESC LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().filter_map(row_to_attempt).collect())
    }

    /// Number of retained attempts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[allow(clippy::cast_sign_loss)]
    pub async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM cleanup_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("count") as u64)
    }

    /// Persist the stats snapshot, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn save_stats(&self, stats: &CleanupStats) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO cleanup_stats
                (id, total_accounts, expired_accounts, deleted_accounts, failed_accounts, last_run_at)
            VALUES (1, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                total_accounts = excluded.total_accounts,
                expired_accounts = excluded.expired_accounts,
                deleted_accounts = excluded.deleted_accounts,
                failed_accounts = excluded.failed_accounts,
                last_run_at = excluded.last_run_at
            ",
        )
        .bind(stats.total_accounts as i64)
        .bind(stats.expired_accounts as i64)
        .bind(stats.deleted_accounts as i64)
        .bind(stats.failed_accounts as i64)
        .bind(stats.last_run_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load the stats snapshot, if one has been saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[allow(clippy::cast_sign_loss)]
    pub async fn load_stats(&self) -> Result<Option<CleanupStats>> {
        let row = sqlx::query("SELECT * FROM cleanup_stats WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| CleanupStats {
            total_accounts: row.get::<i64, _>("total_accounts") as u64,
            expired_accounts: row.get::<i64, _>("expired_accounts") as u64,
            deleted_accounts: row.get::<i64, _>("deleted_accounts") as u64,
            failed_accounts: row.get::<i64, _>("failed_accounts") as u64,
            last_run_at: row
                .get::<Option<String>, _>("last_run_at")
                .as_deref()
                .and_then(|raw| {
                    DateTime::parse_from_rfc3339(raw)
                        .ok()
                        .map(|t| t.with_timezone(&Utc))
                }),
        }))
    }

    /// Remove every attempt and the stats snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM cleanup_log")
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM cleanup_stats")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Convert a database row to an attempt, discarding corrupt rows.
fn row_to_attempt(row: &sqlx::sqlite::SqliteRow) -> Option<CleanupAttempt> {
    let id: i64 = row.get("id");

    let at_raw: String = row.get("created_at");
    let Some(at) = DateTime::parse_from_rfc3339(&at_raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
    else {
        warn!("Discarding cleanup row {id} with corrupt timestamp");
        return None;
    };

    Some(CleanupAttempt {
        id,
        account_id: AccountId::new(row.get::<String, _>("account_id")),
        at,
        reason: row.get("reason"),
        success: row.get::<i64, _>("success") != 0,
        error: row.get("error"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let repo = CleanupLogRepository::in_memory().await.unwrap();
        let id = AccountId::new("acc-1");

        repo.record(&id, "expired", false, Some("503 from provider"))
            .await
            .unwrap();
        repo.record(&id, "expired", true, None).await.unwrap();

        let attempts = repo.recent(10).await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert!(attempts[0].success);
        assert!(!attempts[1].success);
        assert_eq!(attempts[1].error.as_deref(), Some("503 from provider"));
        assert_eq!(attempts[1].reason, "expired");
    }

    #[tokio::test]
    async fn test_ring_cap() {
        let repo = CleanupLogRepository::in_memory()
            .await
            .unwrap()
            .with_max_entries(2);
        let id = AccountId::new("acc-1");

        for i in 0..4 {
            repo.record(&id, "expired", false, Some(&format!("err {i}")))
                .await
                .unwrap();
        }

        assert_eq!(repo.count().await.unwrap(), 2);
        let attempts = repo.recent(10).await.unwrap();
        assert_eq!(attempts[0].error.as_deref(), Some("err 3"));
        assert_eq!(attempts[1].error.as_deref(), Some("err 2"));
    }

    #[tokio::test]
    async fn test_stats_snapshot_round_trip() {
        let repo = CleanupLogRepository::in_memory().await.unwrap();
        assert!(repo.load_stats().await.unwrap().is_none());

        let stats = CleanupStats {
            total_accounts: 10,
            expired_accounts: 2,
            deleted_accounts: 5,
            failed_accounts: 1,
            last_run_at: Some(Utc::now()),
        };
        repo.save_stats(&stats).await.unwrap();

        let loaded = repo.load_stats().await.unwrap().unwrap();
        assert_eq!(loaded, stats);

        // A second save replaces rather than accumulates.
        let newer = CleanupStats {
            total_accounts: 11,
            ..stats
        };
        repo.save_stats(&newer).await.unwrap();
        assert_eq!(repo.load_stats().await.unwrap().unwrap().total_accounts, 11);
    }
}
