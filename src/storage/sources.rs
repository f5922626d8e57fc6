use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{Source, SourceSeed};

impl Database {
    // ========================================================================
    // Source Registry
    // ========================================================================

    /// Sync sources from configuration (insert new, rename existing by feed_url)
    ///
    /// Batch INSERT in chunks of 100 inside one transaction.
    pub async fn sync_sources(&self, sources: &[SourceSeed]) -> Result<()> {
        if sources.is_empty() {
            return Ok(());
        }

        const BATCH_SIZE: usize = 100;
        let mut tx = self.pool.begin().await?;

        for chunk in sources.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("INSERT INTO sources (name, feed_url) ");

            builder.push_values(chunk, |mut b, source| {
                b.push_bind(&source.name).push_bind(&source.feed_url);
            });

            builder.push(" ON CONFLICT(feed_url) DO UPDATE SET name = excluded.name");

            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// List every registered source in registry order (by id)
    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        let sources = sqlx::query_as::<_, Source>(
            r#"
            SELECT id, name, feed_url, last_fetched_at, last_error
            FROM sources
            ORDER BY id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sources)
    }

    /// Record a successful fetch: stamp last_fetched_at and clear the error
    pub async fn mark_source_fetched(&self, source_id: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE sources SET last_fetched_at = ?, last_error = NULL WHERE id = ?")
            .bind(now)
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a failed fetch. The source stays in the registry and is retried
    /// on the next run.
    pub async fn set_source_error(&self, source_id: i64, error: &str) -> Result<()> {
        sqlx::query("UPDATE sources SET last_error = ? WHERE id = ?")
            .bind(error)
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, SourceSeed};

    fn seed(name: &str, url: &str) -> SourceSeed {
        SourceSeed {
            name: name.to_string(),
            feed_url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sync_sources_is_idempotent_by_url() {
        let db = Database::open(Database::IN_MEMORY).await.unwrap();
        db.sync_sources(&[seed("Old", "https://a.example/feed")])
            .await
            .unwrap();
        db.sync_sources(&[
            seed("New", "https://a.example/feed"),
            seed("B", "https://b.example/feed"),
        ])
        .await
        .unwrap();

        let sources = db.list_sources().await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "New");
        assert_eq!(sources[1].feed_url, "https://b.example/feed");
    }

    #[tokio::test]
    async fn test_fetch_bookkeeping() {
        let db = Database::open(Database::IN_MEMORY).await.unwrap();
        db.sync_sources(&[seed("A", "https://a.example/feed")])
            .await
            .unwrap();
        let id = db.list_sources().await.unwrap()[0].id;

        db.set_source_error(id, "HTTP error: status 503").await.unwrap();
        let source = &db.list_sources().await.unwrap()[0];
        assert_eq!(source.last_error.as_deref(), Some("HTTP error: status 503"));
        assert!(source.last_fetched_at.is_none());

        db.mark_source_fetched(id).await.unwrap();
        let source = &db.list_sources().await.unwrap()[0];
        assert!(source.last_error.is_none());
        assert!(source.last_fetched_at.is_some());
    }
}
