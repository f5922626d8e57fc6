use serde::Serialize;

use crate::classify::RejectReason;

/// What happened to one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Inserted(i64),
    /// URL already persisted before this entry was checked
    Duplicate,
    /// Lost an insert race on the unique article URL
    AlreadyExists,
    Unreachable,
    Rejected(RejectReason),
    /// Store error or other failure local to this entry
    Failed(String),
}

/// Structured result of one ingestion run.
///
/// `articles_added` is the primary signal. `success` is false only when the
/// run could not start (store unreachable, registry unreadable).
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub articles_added: usize,
    pub sources_total: usize,
    pub sources_failed: usize,
    pub entries_attempted: usize,
    pub duplicates: usize,
    pub already_exists: usize,
    pub unreachable: usize,
    pub rejected: usize,
    pub failed_entries: usize,
    pub rounds: usize,
    /// Stopped early by a shutdown request
    pub interrupted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: String,
    pub duration_ms: u64,
}

impl IngestReport {
    pub(crate) fn failed(started_at: String, error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            started_at,
            ..Default::default()
        }
    }

    pub(crate) fn record(&mut self, outcome: &EntryOutcome) {
        self.entries_attempted += 1;
        match outcome {
            EntryOutcome::Inserted(_) => self.articles_added += 1,
            EntryOutcome::Duplicate => self.duplicates += 1,
            EntryOutcome::AlreadyExists => self.already_exists += 1,
            EntryOutcome::Unreachable => self.unreachable += 1,
            EntryOutcome::Rejected(_) => self.rejected += 1,
            EntryOutcome::Failed(_) => self.failed_entries += 1,
        }
    }
}
