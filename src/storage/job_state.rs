use anyhow::Result;

use super::schema::Database;

/// UPSERT one job-state key, refreshing `updated_at`. Runs on whatever
/// connection or transaction the caller holds.
pub(super) async fn upsert_job_state<'e, E>(executor: E, key: &str, value: &str) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO job_state (key, value, updated_at)
        VALUES (?, ?, datetime('now'))
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
    "#,
    )
    .bind(key)
    .bind(value)
    .execute(executor)
    .await?;
    Ok(())
}

impl Database {
    // ========================================================================
    // Job State
    // ========================================================================

    /// Get a single job-state value by key.
    ///
    /// Keys use dotted convention: `ingest.last_run_at`, `cleanup.last_report`.
    pub async fn get_job_state(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM job_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Record a finished run: its RFC 3339 timestamp and serialized report,
    /// written together.
    pub async fn record_run(
        &self,
        last_run_key: &str,
        report_key: &str,
        finished_at: &str,
        report_json: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_job_state(&mut *tx, last_run_key, finished_at).await?;
        upsert_job_state(&mut *tx, report_key, report_json).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, INGEST_LAST_REPORT, INGEST_LAST_RUN};

    #[tokio::test]
    async fn test_get_missing_key_returns_none() {
        let db = Database::open(Database::IN_MEMORY).await.unwrap();
        assert!(db.get_job_state("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_run_overwrites() {
        let db = Database::open(Database::IN_MEMORY).await.unwrap();
        db.record_run("a.last_run_at", "a.last_report", "t1", "1").await.unwrap();
        db.record_run("a.last_run_at", "a.last_report", "t2", "2").await.unwrap();
        assert_eq!(db.get_job_state("a.last_run_at").await.unwrap().as_deref(), Some("t2"));
        assert_eq!(db.get_job_state("a.last_report").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_record_run_writes_both_keys() {
        let db = Database::open(Database::IN_MEMORY).await.unwrap();
        db.record_run(
            INGEST_LAST_RUN,
            INGEST_LAST_REPORT,
            "2024-06-15T12:00:00+00:00",
            r#"{"success":true}"#,
        )
        .await
        .unwrap();

        assert_eq!(
            db.get_job_state(INGEST_LAST_RUN).await.unwrap().as_deref(),
            Some("2024-06-15T12:00:00+00:00")
        );
        assert_eq!(
            db.get_job_state(INGEST_LAST_REPORT).await.unwrap().as_deref(),
            Some(r#"{"success":true}"#)
        );
    }
}
