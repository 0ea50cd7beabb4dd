//! Audit log storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::warn;

use super::model::{AuditAction, AuditEntry};
use crate::{AccountId, Result};

/// Default maximum number of retained audit entries.
pub const DEFAULT_MAX_ENTRIES: u32 = 500;

/// Repository for the append-only, size-capped audit log.
pub struct AuditLogRepository {
    pool: SqlitePool,
    max_entries: u32,
}

impl AuditLogRepository {
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
            max_entries: DEFAULT_MAX_ENTRIES,
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
            max_entries: DEFAULT_MAX_ENTRIES,
        };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Sets the retention cap.
    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: u32) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id TEXT NOT NULL,
                action TEXT NOT NULL,
                created_at TEXT NOT NULL,
                detail TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_audit_account ON audit_log(account_id)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append an entry, evicting the oldest entries beyond the cap.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn append(
        &self,
        account_id: &AccountId,
        action: AuditAction,
        detail: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_log (account_id, action, created_at, detail) VALUES (?, ?, ?, ?)",
        )
        .bind(account_id.as_str())
        .bind(action.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(detail)
        .execute(&self.pool)
        .await?;

        // Oldest-first eviction down to the cap
        sqlx::query(
            r"
            DELETE FROM audit_log
            WHERE id NOT IN (SELECT id FROM audit_log ORDER BY id DESC LIMIT ?)
            ",
        )
        .bind(i64::from(self.max_entries))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The most recent entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn recent(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query("SELECT * FROM audit_log ORDER BY id DESC LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().filter_map(row_to_entry).collect())
    }

    /// All entries for one account, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn for_account(&self, account_id: &AccountId) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query("SELECT * FROM audit_log WHERE account_id = ? ORDER BY id ASC")
            .bind(account_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().filter_map(row_to_entry).collect())
    }

    /// Number of retained entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[allow(clippy::cast_sign_loss)]
    pub async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM audit_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("count") as u64)
    }

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM audit_log")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Convert a database row to an entry, discarding corrupt rows.
fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Option<AuditEntry> {
    let id: i64 = row.get("id");

    let action_tag: String = row.get("action");
    let Some(action) = AuditAction::parse(&action_tag) else {
        warn!("Discarding audit row {id} with unknown action {action_tag}");
        return None;
    };

    let at_raw: String = row.get("created_at");
    let Some(at) = DateTime::parse_from_rfc3339(&at_raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
    else {
        warn!("Discarding audit row {id} with corrupt timestamp");
        return None;
    };

    Some(AuditEntry {
        id,
        account_id: AccountId::new(row.get::<String, _>("account_id")),
        action,
        at,
        detail: row.get("detail"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let repo = AuditLogRepository::in_memory().await.unwrap();
        let id = AccountId::new("acc-1");

        repo.append(&id, AuditAction::Created, Some("throwaway@example.test"))
            .await
            .unwrap();
        repo.append(&id, AuditAction::Accessed, None).await.unwrap();

        let entries = repo.for_account(&id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::Created);
        assert_eq!(entries[0].detail.as_deref(), Some("throwaway@example.test"));
        assert_eq!(entries[1].action, AuditAction::Accessed);
    }

    #[tokio::test]
    async fn test_cap_evicts_oldest_first() {
        let repo = AuditLogRepository::in_memory()
            .await
            .unwrap()
            .with_max_entries(3);

        for i in 0..5 {
            let id = AccountId::new(format!("acc-{i}"));
            repo.append(&id, AuditAction::Created, None).await.unwrap();
        }

        assert_eq!(repo.count().await.unwrap(), 3);
        let entries = repo.recent(10).await.unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.account_id.as_str()).collect();
        assert_eq!(ids, vec!["acc-4", "acc-3", "acc-2"]);
    }

    #[tokio::test]
    async fn test_unknown_action_rows_are_discarded() {
        let repo = AuditLogRepository::in_memory().await.unwrap();
        let id = AccountId::new("acc-1");
        repo.append(&id, AuditAction::Created, None).await.unwrap();

        sqlx::query(
            "INSERT INTO audit_log (account_id, action, created_at) VALUES ('acc-1', 'BOGUS', ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(&repo.pool)
        .await
        .unwrap();

        let entries = repo.for_account(&id).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        // The log never exceeds its cap, whatever the append pattern.
        #[test]
        fn prop_cap_never_exceeded(cap in 1u32..8, appends in 0usize..24) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let repo = AuditLogRepository::in_memory()
                    .await
                    .unwrap()
                    .with_max_entries(cap);
                let id = AccountId::new("acc-prop");

                for _ in 0..appends {
                    repo.append(&id, AuditAction::Accessed, None).await.unwrap();
                }

                let count = repo.count().await.unwrap();
                prop_assert!(count <= u64::from(cap));
                prop_assert_eq!(count, std::cmp::min(u64::from(cap), appends as u64));
                Ok(())
            })?;
        }
    }
}
