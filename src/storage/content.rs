use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{Content, ContentStats, InsertOutcome, NewContent, TopicCount};

/// Predicate selecting content not protected by any like-interaction.
/// Every retention count and delete is scoped by it.
pub(crate) const ELIGIBLE: &str =
    "id NOT IN (SELECT content_id FROM user_content_interactions WHERE is_liked = 1)";

impl Database {
    // ========================================================================
    // Content Writes
    // ========================================================================

    /// Exact-match lookup on article_url
    pub async fn content_exists(&self, article_url: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM content WHERE article_url = ?")
            .bind(article_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert one accepted article in its own statement.
    ///
    /// The unique constraint on article_url decides races: of N concurrent
    /// inserts for one URL exactly one returns `Inserted`, the rest
    /// `AlreadyExists`.
    pub async fn insert_content(&self, content: &NewContent) -> Result<InsertOutcome> {
        let now = chrono::Utc::now().timestamp();
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO content
                (source_id, title, excerpt, article_url, published_at, topic, image_url, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(article_url) DO NOTHING
            RETURNING id
        "#,
        )
        .bind(content.source_id)
        .bind(&content.title)
        .bind(&content.excerpt)
        .bind(&content.article_url)
        .bind(content.published_at)
        .bind(&content.topic)
        .bind(&content.image_url)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some((id,)) => InsertOutcome::Inserted(id),
            None => InsertOutcome::AlreadyExists,
        })
    }

    // ========================================================================
    // Content Queries
    // ========================================================================

    pub async fn get_content_by_url(&self, article_url: &str) -> Result<Option<Content>> {
        let row = sqlx::query_as::<_, Content>(
            r#"
            SELECT id, source_id, title, excerpt, article_url, published_at, topic,
                   image_url, ingested_at
            FROM content
            WHERE article_url = ?
        "#,
        )
        .bind(article_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Content not protected by a like, newest first
    pub async fn list_eligible_content(&self) -> Result<Vec<Content>> {
        let sql = format!(
            r#"
            SELECT id, source_id, title, excerpt, article_url, published_at, topic,
                   image_url, ingested_at
            FROM content
            WHERE {ELIGIBLE}
            ORDER BY published_at DESC, id DESC
        "#
        );
        let rows = sqlx::query_as::<_, Content>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count_content(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM content")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Delete the given rows unless they became liked meanwhile.
    ///
    /// The eligibility predicate is re-applied inside the DELETE, so a like
    /// recorded after the caller read the ids still protects the row.
    pub async fn delete_eligible_by_ids(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        const BATCH_SIZE: usize = 500;
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for chunk in ids.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("DELETE FROM content WHERE ");
            builder.push(ELIGIBLE);
            builder.push(" AND id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            deleted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(deleted)
    }

    /// Catalog summary: totals, liked count, per-topic breakdown, last runs
    pub async fn content_stats(&self) -> Result<ContentStats> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM content")
            .fetch_one(&self.pool)
            .await?;
        let (liked,): (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT content_id) FROM user_content_interactions WHERE is_liked = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        let (sources,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sources")
            .fetch_one(&self.pool)
            .await?;
        let by_topic = sqlx::query_as::<_, TopicCount>(
            "SELECT topic, COUNT(*) AS count FROM content GROUP BY topic ORDER BY count DESC, topic",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ContentStats {
            total,
            liked,
            sources,
            by_topic,
            last_ingest_at: self.get_job_state(super::INGEST_LAST_RUN).await?,
            last_cleanup_at: self.get_job_state(super::CLEANUP_LAST_RUN).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, InsertOutcome, NewContent, SourceSeed};
    use pretty_assertions::assert_eq;

    async fn db_with_source() -> (Database, i64) {
        let db = Database::open(Database::IN_MEMORY).await.unwrap();
        db.sync_sources(&[SourceSeed {
            name: "Feed".into(),
            feed_url: "https://feed.example/rss".into(),
        }])
        .await
        .unwrap();
        let id = db.list_sources().await.unwrap()[0].id;
        (db, id)
    }

    fn article(source_id: i64, url: &str, topic: &str) -> NewContent {
        NewContent {
            source_id,
            title: "Rust 2.0 released".into(),
            excerpt: "Excerpt".into(),
            article_url: url.into(),
            published_at: 1_700_000_000,
            topic: topic.into(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_insert_then_exists() {
        let (db, source_id) = db_with_source().await;
        assert!(!db.content_exists("https://a.example/1").await.unwrap());

        let outcome = db
            .insert_content(&article(source_id, "https://a.example/1", "Open Source"))
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(id) if id > 0));
        assert!(db.content_exists("https://a.example/1").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_url_is_already_exists_not_error() {
        let (db, source_id) = db_with_source().await;
        let a = article(source_id, "https://a.example/1", "Open Source");
        db.insert_content(&a).await.unwrap();

        let second = db.insert_content(&a).await.unwrap();
        assert_eq!(second, InsertOutcome::AlreadyExists);
        assert_eq!(db.count_content().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stats_group_by_topic() {
        let (db, source_id) = db_with_source().await;
        for (i, topic) in ["AI & ML", "AI & ML", "Open Source"].iter().enumerate() {
            db.insert_content(&article(source_id, &format!("https://a.example/{i}"), topic))
                .await
                .unwrap();
        }

        let stats = db.content_stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.liked, 0);
        assert_eq!(stats.sources, 1);
        assert_eq!(stats.by_topic[0].topic, "AI & ML");
        assert_eq!(stats.by_topic[0].count, 2);
        assert!(stats.last_ingest_at.is_none());
    }

    #[tokio::test]
    async fn test_delete_by_ids_skips_liked() {
        let (db, source_id) = db_with_source().await;
        let a = db
            .insert_content(&article(source_id, "https://a.example/1", "Open Source"))
            .await
            .unwrap();
        let b = db
            .insert_content(&article(source_id, "https://a.example/2", "Open Source"))
            .await
            .unwrap();
        let (InsertOutcome::Inserted(a), InsertOutcome::Inserted(b)) = (a, b) else {
            panic!("expected inserts");
        };
        db.set_liked(7, a, true).await.unwrap();

        let deleted = db.delete_eligible_by_ids(&[a, b]).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(db.content_exists("https://a.example/1").await.unwrap());
        assert!(!db.content_exists("https://a.example/2").await.unwrap());
    }
}
