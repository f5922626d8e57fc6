use anyhow::Result;
use std::collections::HashSet;

use super::schema::Database;
use super::types::Interaction;

impl Database {
    // ========================================================================
    // Interactions
    // ========================================================================
    //
    // Written by the web layer. Ingestion never touches this table; retention
    // only reads the liked set.

    /// Set the liked flag for one user (UPSERT), preserving read state
    pub async fn set_liked(&self, user_id: i64, content_id: i64, is_liked: bool) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO user_content_interactions (user_id, content_id, is_liked, interaction_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, content_id) DO UPDATE SET
                is_liked = excluded.is_liked,
                interaction_at = excluded.interaction_at
        "#,
        )
        .bind(user_id)
        .bind(content_id)
        .bind(is_liked)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Set the read flag for one user (UPSERT), preserving liked state
    pub async fn set_read(&self, user_id: i64, content_id: i64, is_read: bool) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO user_content_interactions (user_id, content_id, is_read, interaction_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, content_id) DO UPDATE SET
                is_read = excluded.is_read,
                interaction_at = excluded.interaction_at
        "#,
        )
        .bind(user_id)
        .bind(content_id)
        .bind(is_read)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_interaction(
        &self,
        user_id: i64,
        content_id: i64,
    ) -> Result<Option<Interaction>> {
        let row = sqlx::query_as::<_, Interaction>(
            r#"
            SELECT user_id, content_id, is_read, is_liked, interaction_at
            FROM user_content_interactions
            WHERE user_id = ? AND content_id = ?
        "#,
        )
        .bind(user_id)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Ids of content liked by at least one user
    pub async fn list_liked_content_ids(&self) -> Result<HashSet<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT content_id FROM user_content_interactions WHERE is_liked = 1",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
