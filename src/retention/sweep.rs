use anyhow::Result;
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::classify::{ClassifierGate, RejectReason, Verdict};
use crate::storage::{Database, PRUNE_LAST_REPORT, PRUNE_LAST_RUN};

/// Result of one relevance sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub removed: u64,
    /// Rows kept because the classifier timed out or failed on them
    pub skipped: usize,
}

enum Review {
    Keep,
    Remove(i64),
    Skip,
}

/// Re-runs the classifier gate over stored, non-liked content and deletes
/// whatever it now rejects. Used after the topic set or keyword rules change.
pub struct RelevanceSweep {
    db: Database,
    gate: ClassifierGate,
    concurrency: usize,
}

impl RelevanceSweep {
    pub fn new(db: Database, gate: ClassifierGate, concurrency: usize) -> Self {
        Self {
            db,
            gate,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run_once(&self) -> Result<SweepReport> {
        let candidates = self.db.list_eligible_content().await?;
        let checked = candidates.len();

        let reviews: Vec<Review> = stream::iter(candidates)
            .map(|content| async move {
                match self.gate.check(&content.title, &content.excerpt).await {
                    Verdict::Accept(_) => Review::Keep,
                    // A classifier outage says nothing about the article
                    Verdict::Reject(reason @ (RejectReason::Timeout | RejectReason::Failed(_))) => {
                        tracing::warn!(
                            content_id = content.id,
                            reason = ?reason,
                            "Classifier unavailable, keeping stored article"
                        );
                        Review::Skip
                    }
                    Verdict::Reject(reason) => {
                        tracing::debug!(
                            content_id = content.id,
                            url = %content.article_url,
                            reason = ?reason,
                            "Stored article no longer relevant"
                        );
                        Review::Remove(content.id)
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let skipped = reviews.iter().filter(|r| matches!(r, Review::Skip)).count();
        let rejected: Vec<i64> = reviews
            .into_iter()
            .filter_map(|r| match r {
                Review::Remove(id) => Some(id),
                Review::Keep | Review::Skip => None,
            })
            .collect();

        // Re-checks eligibility in the DELETE, so a like recorded meanwhile wins
        let removed = self.db.delete_eligible_by_ids(&rejected).await?;
        let report = SweepReport {
            checked,
            removed,
            skipped,
        };

        tracing::info!(
            checked = checked,
            removed = removed,
            skipped = skipped,
            "Relevance sweep complete"
        );

        let json = serde_json::to_string(&report)?;
        let finished_at = chrono::Utc::now().to_rfc3339();
        if let Err(e) = self
            .db
            .record_run(PRUNE_LAST_RUN, PRUNE_LAST_REPORT, &finished_at, &json)
            .await
        {
            tracing::warn!(error = %e, "Failed to record relevance sweep");
        }
        Ok(report)
    }
}
