use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

/// Handle to the content store.
///
/// Cheap to clone: all clones share one connection pool. Every public
/// operation owns its connection (or transaction) for the duration of the
/// call and returns it to the pool on every exit path.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Path that selects a private in-memory database.
    pub const IN_MEMORY: &'static str = ":memory:";

    /// Open a database connection and run migrations
    ///
    /// `":memory:"` opens a single-connection pool whose connection never
    /// expires, since every SQLite connection to `:memory:` is a separate
    /// database.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Unavailable` if the file cannot be opened or is
    /// locked by another writer past the busy timeout.
    /// Returns `DatabaseError::Migration` if the schema cannot be created.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let in_memory = path == Self::IN_MEMORY;
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: concurrent ingestion and cleanup runs wait up to
        // 5 seconds for the write lock before surfacing SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000")
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(10));
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate()
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        tracing::debug!(path = %path, "Database opened");
        Ok(db)
    }

    /// Close the pool. Subsequent operations fail with a pool-closed error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Cheap liveness check used before a run starts.
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                feed_url TEXT UNIQUE NOT NULL,
                last_fetched_at INTEGER,
                last_error TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content (
                id INTEGER PRIMARY KEY,
                source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                excerpt TEXT NOT NULL,
                article_url TEXT UNIQUE NOT NULL,
                published_at INTEGER NOT NULL,
                topic TEXT NOT NULL,
                image_url TEXT,
                ingested_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_content_interactions (
                user_id INTEGER NOT NULL,
                content_id INTEGER NOT NULL REFERENCES content(id) ON DELETE CASCADE,
                is_read INTEGER NOT NULL DEFAULT 0,
                is_liked INTEGER NOT NULL DEFAULT 0,
                interaction_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, content_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Retention counts and deletes filter on published_at
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_content_published ON content(published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_content_topic ON content(topic)")
            .execute(&mut *tx)
            .await?;

        // Partial index backing the eligibility subquery (liked content ids)
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_interactions_liked ON user_content_interactions(content_id) WHERE is_liked = 1",
        )
        .execute(&mut *tx)
        .await?;

        // Key-value bookkeeping for scheduled jobs (ingest.last_run_at, ...)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
