//! Session storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::warn;

use super::model::StoredSession;
use crate::Result;

const CURRENT_KEY: &str = "current";

/// Key-value repository for the current-session record.
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
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
            CREATE TABLE IF NOT EXISTS session (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database query fails.
    pub async fn set_current(&self, session: &StoredSession) -> Result<()> {
        let value = serde_json::to_string(session)?;
        sqlx::query(
            r"
            INSERT INTO session (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
        )
        .bind(CURRENT_KEY)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load the current session, if one is stored.
    ///
    /// A blob that fails to parse is treated as corrupt state: it is
    /// removed and `None` is returned rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn current(&self) -> Result<Option<StoredSession>> {
        let row = sqlx::query("SELECT value FROM session WHERE key = ?")
            .bind(CURRENT_KEY)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value: String = row.get("value");
        match serde_json::from_str(&value) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("Discarding corrupt session record: {e}");
                self.clear_current().await?;
                Ok(None)
            }
        }
    }

    /// Remove the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn clear_current(&self) -> Result<()> {
        sqlx::query("DELETE FROM session WHERE key = ?")
            .bind(CURRENT_KEY)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::AccountId;
    use chrono::Utc;

    fn sample() -> StoredSession {
        StoredSession {
            account_id: AccountId::new("acc-1"),
            address: "throwaway@example.test".to_string(),
            token: "tok".to_string(),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_set_and_get_current() {
        let repo = SessionRepository::in_memory().await.unwrap();
        assert!(repo.current().await.unwrap().is_none());

        let session = sample();
        repo.set_current(&session).await.unwrap();
        assert_eq!(repo.current().await.unwrap(), Some(session));

        repo.clear_current().await.unwrap();
        assert!(repo.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_blob_resets_to_empty() {
        let repo = SessionRepository::in_memory().await.unwrap();

        sqlx::query("INSERT INTO session (key, value) VALUES ('current', 'not json at all')")
            .execute(&repo.pool)
            .await
            .unwrap();

        assert!(repo.current().await.unwrap().is_none());

        // The corrupt row was removed, not just skipped.
        let rows = sqlx::query("SELECT * FROM session")
            .fetch_all(&repo.pool)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
