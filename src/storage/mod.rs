mod content;
mod eviction;
mod interactions;
mod job_state;
mod schema;
mod sources;
mod types;

pub use eviction::{DayBounds, RetentionTx};
pub use schema::Database;
pub use types::{
    Content, ContentStats, DatabaseError, EligibleCounts, InsertOutcome, Interaction, NewContent,
    Source, SourceSeed, TopicCount,
};

/// `job_state` keys
pub const INGEST_LAST_RUN: &str = "ingest.last_run_at";
pub const INGEST_LAST_REPORT: &str = "ingest.last_report";
pub const CLEANUP_LAST_RUN: &str = "cleanup.last_run_at";
pub const CLEANUP_LAST_REPORT: &str = "cleanup.last_report";
pub const CLEANUP_STARTED: &str = "cleanup.started_at";
pub const PRUNE_LAST_RUN: &str = "prune.last_run_at";
pub const PRUNE_LAST_REPORT: &str = "prune.last_report";
