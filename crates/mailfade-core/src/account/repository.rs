//! Account storage repository.

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::warn;

use super::model::{Account, AccountId};
use crate::Result;
use crate::cleanup::CleanupStats;

/// Repository for account storage and retrieval.
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
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

        let repo = Self { pool };
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

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                address TEXT NOT NULL,
                password TEXT NOT NULL,
                token TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                last_accessed_at TEXT,
                message_count INTEGER NOT NULL DEFAULT 0,
                cleanup_attempts INTEGER NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Index for finding cleanup candidates
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_accounts_expires ON accounts(expires_at)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Save an account (insert or update).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO accounts
                (id, address, password, token, created_at, expires_at,
                 deleted, last_accessed_at, message_count, cleanup_attempts)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                address = excluded.address,
                password = excluded.password,
                token = excluded.token,
                expires_at = excluded.expires_at,
                deleted = excluded.deleted,
                last_accessed_at = excluded.last_accessed_at,
                message_count = excluded.message_count,
                cleanup_attempts = excluded.cleanup_attempts
            ",
        )
        .bind(account.id.as_str())
        .bind(&account.address)
        .bind(&account.password)
        .bind(&account.token)
        .bind(account.created_at.to_rfc3339())
        .bind(account.expires_at.to_rfc3339())
        .bind(account.deleted)
        .bind(account.last_accessed_at.map(|t| t.to_rfc3339()))
        .bind(i64::from(account.message_count))
        .bind(i64::from(account.cleanup_attempts))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: &AccountId) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().and_then(row_to_account))
    }

    /// Get all accounts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query("SELECT * FROM accounts ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().filter_map(row_to_account).collect())
    }

    /// Get accounts eligible for a cleanup sweep: not yet deleted and
    /// either expired or older than the retention window.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn cleanup_candidates(
        &self,
        now: DateTime<Utc>,
        max_retention: Duration,
    ) -> Result<Vec<Account>> {
        let retention_cutoff = now - max_retention;

        let rows = sqlx::query(
            r"
            SELECT * FROM accounts
            WHERE deleted = 0 AND (expires_at <= ? OR created_at <= ?)
            ORDER BY expires_at ASC
            ",
        )
        .bind(now.to_rfc3339())
        .bind(retention_cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_account).collect())
    }

    /// Mark an account as deleted. Never undone.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_deleted(&self, id: &AccountId) -> Result<()> {
        sqlx::query("UPDATE accounts SET deleted = 1 WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Record an inbox access: bumps the last-accessed time and message count.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn record_access(&self, id: &AccountId, message_count: u32) -> Result<()> {
        sqlx::query(
            "UPDATE accounts SET last_accessed_at = ?, message_count = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(i64::from(message_count))
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Increment the failed-cleanup counter for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn record_cleanup_attempt(&self, id: &AccountId) -> Result<()> {
        sqlx::query("UPDATE accounts SET cleanup_attempts = cleanup_attempts + 1 WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Move an account's expiry forward.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn extend_expiry(&self, id: &AccountId, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE accounts SET expires_at = ? WHERE id = ?")
            .bind(expires_at.to_rfc3339())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete account rows created before the cutoff, regardless of
    /// remote state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM accounts WHERE created_at <= ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Compute aggregate counters over the stored accounts.
    ///
    /// A snapshot, recomputed from scratch each time rather than
    /// maintained incrementally.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[allow(clippy::cast_sign_loss)]
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<CleanupStats> {
        let row = sqlx::query(
            r"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN deleted = 0 AND expires_at <= ? THEN 1 ELSE 0 END), 0) AS expired,
                COALESCE(SUM(CASE WHEN deleted = 1 THEN 1 ELSE 0 END), 0) AS deleted,
                COALESCE(SUM(CASE WHEN deleted = 0 AND cleanup_attempts > 0 THEN 1 ELSE 0 END), 0) AS failed
            FROM accounts
            ",
        )
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(CleanupStats {
            total_accounts: row.get::<i64, _>("total") as u64,
            expired_accounts: row.get::<i64, _>("expired") as u64,
            deleted_accounts: row.get::<i64, _>("deleted") as u64,
            failed_accounts: row.get::<i64, _>("failed") as u64,
            last_run_at: None,
        })
    }

    /// Remove every stored account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM accounts")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Convert a database row to an Account.
///
/// Rows with unparseable timestamps are discarded rather than failing
/// the whole read.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Option<Account> {
    let id: String = row.get("id");

    let created_at = parse_timestamp(&row.get::<String, _>("created_at"));
    let expires_at = parse_timestamp(&row.get::<String, _>("expires_at"));
    let (Some(created_at), Some(expires_at)) = (created_at, expires_at) else {
        warn!("Discarding account row {id} with corrupt timestamps");
        return None;
    };

    let last_accessed_at = row
        .get::<Option<String>, _>("last_accessed_at")
        .as_deref()
        .and_then(parse_timestamp);

    Some(Account {
        id: AccountId::new(id),
        address: row.get("address"),
        password: row.get("password"),
        token: row.get("token"),
        created_at,
        expires_at,
        deleted: row.get::<i64, _>("deleted") != 0,
        last_accessed_at,
        message_count: row.get::<i64, _>("message_count") as u32,
        cleanup_attempts: row.get::<i64, _>("cleanup_attempts") as u32,
    })
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
