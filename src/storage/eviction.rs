use anyhow::Result;
use sqlx::{Sqlite, Transaction};

use super::content::ELIGIBLE;
use super::job_state::upsert_job_state;
use super::schema::Database;
use super::types::EligibleCounts;

/// Unix-second boundaries of the local calendar days a retention decision
/// looks at. `yesterday_start < today_start < tomorrow_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub yesterday_start: i64,
    pub today_start: i64,
    pub tomorrow_start: i64,
}

/// A write transaction scoped to one retention run.
///
/// Opening it takes SQLite's RESERVED lock immediately, so ingestion inserts
/// wait until the decision and its delete are committed or rolled back; the
/// counts cannot go stale between decision and delete. Dropping the value
/// without `commit` rolls back.
pub struct RetentionTx {
    tx: Transaction<'static, Sqlite>,
}

impl Database {
    /// Begin a retention transaction and stamp `cleanup.started_at`.
    pub async fn begin_retention(&self) -> Result<RetentionTx> {
        let mut tx = self.pool.begin().await?;

        // First statement is a write: acquires the write lock up front
        upsert_job_state(&mut *tx, super::CLEANUP_STARTED, &chrono::Utc::now().to_rfc3339()).await?;

        Ok(RetentionTx { tx })
    }
}

impl RetentionTx {
    /// Count eligible content with `since <= published_at < until`; either
    /// bound may be open.
    pub async fn count_eligible(&mut self, since: Option<i64>, until: Option<i64>) -> Result<i64> {
        let sql = format!(
            r#"
            SELECT COUNT(*) FROM content
            WHERE {ELIGIBLE}
              AND (?1 IS NULL OR published_at >= ?1)
              AND (?2 IS NULL OR published_at < ?2)
        "#
        );
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(since)
            .bind(until)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    /// Fresh-today, yesterday and total eligible counts in one snapshot
    pub async fn eligible_counts(&mut self, days: &DayBounds) -> Result<EligibleCounts> {
        let fresh_today = self
            .count_eligible(Some(days.today_start), Some(days.tomorrow_start))
            .await?;
        let yesterday = self
            .count_eligible(Some(days.yesterday_start), Some(days.today_start))
            .await?;
        let total_eligible = self.count_eligible(None, None).await?;
        Ok(EligibleCounts {
            fresh_today,
            yesterday,
            total_eligible,
        })
    }

    /// Delete eligible content published strictly before `cutoff`.
    /// Liked rows are never matched.
    pub async fn delete_eligible_older_than(&mut self, cutoff: i64) -> Result<u64> {
        let sql = format!("DELETE FROM content WHERE {ELIGIBLE} AND published_at < ?");
        let result = sqlx::query(&sql)
            .bind(cutoff)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
