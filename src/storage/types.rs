use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with operator-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The database file is locked by another writer or cannot be opened
    #[error("Database is locked or unavailable: {0}")]
    Unavailable(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error, mapping lock and open failures to `Unavailable`
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
            || matches!(err, sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut)
        {
            return DatabaseError::Unavailable(err.to_string());
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Input Types
// ============================================================================

/// A feed source as declared in configuration, before it has an id
#[derive(Debug, Clone)]
pub struct SourceSeed {
    pub name: String,
    pub feed_url: String,
}

/// An accepted article ready to be written
#[derive(Debug, Clone)]
pub struct NewContent {
    pub source_id: i64,
    pub title: String,
    pub excerpt: String,
    pub article_url: String,
    /// Unix seconds
    pub published_at: i64,
    pub topic: String,
    pub image_url: Option<String>,
}

// ============================================================================
// Data Structures
// ============================================================================

/// Feed source row. Read-only to ingestion apart from fetch bookkeeping.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub feed_url: String,
    pub last_fetched_at: Option<i64>,
    pub last_error: Option<String>,
}

/// Persisted article. Never mutated; only deleted by retention.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Content {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub excerpt: String,
    pub article_url: String,
    pub published_at: i64,
    pub topic: String,
    pub image_url: Option<String>,
    pub ingested_at: i64,
}

/// Result of a content write. A unique-constraint hit is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    AlreadyExists,
}

/// Per-user state on a content row, owned by the web layer
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Interaction {
    pub user_id: i64,
    pub content_id: i64,
    pub is_read: bool,
    pub is_liked: bool,
    pub interaction_at: i64,
}

/// Freshness counts over eligible (non-liked) content, observed in one
/// transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EligibleCounts {
    pub fresh_today: i64,
    pub yesterday: i64,
    pub total_eligible: i64,
}

/// Catalog summary for `pulse status`
#[derive(Debug, Clone, Serialize)]
pub struct ContentStats {
    pub total: i64,
    pub liked: i64,
    pub sources: i64,
    pub by_topic: Vec<TopicCount>,
    pub last_ingest_at: Option<String>,
    pub last_cleanup_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopicCount {
    pub topic: String,
    pub count: i64,
}
