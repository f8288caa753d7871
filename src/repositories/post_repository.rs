use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::{
    auth::Viewer,
    config::Limits,
    coordinator,
    error::{ForumError, Result, StorageContext},
    models::Post,
    utils::require_text,
};

#[derive(Clone)]
pub struct PostRepository {
    pool: SqlitePool,
    limits: Limits,
}

impl PostRepository {
    pub fn new(pool: SqlitePool, limits: Limits) -> Self {
        Self { pool, limits }
    }

    /// Appends a post at the topic's next floor and bumps its floor count,
    /// both in one transaction. A conflicting write is retried once.
    pub async fn append(&self, topic_id: i64, content: &str) -> Result<Post> {
        self.append_as(Viewer::Admin, topic_id, content).await
    }

    /// Like [`append`](Self::append), but a guest is refused unless the
    /// topic's category is guest-postable when the floor is allocated.
    pub async fn append_as(&self, viewer: Viewer, topic_id: i64, content: &str) -> Result<Post> {
        let content = require_text("content", content, self.limits.max_content_length)?;

        // Fail fast; the floor increment re-checks inside its transaction.
        let topic_exists = super::row_exists(&self.pool, "topics", topic_id)
            .await
            .context("check topic")?;
        if !topic_exists {
            return Err(ForumError::NotFound("topic"));
        }

        let post = match coordinator::append_post(&self.pool, viewer, topic_id, &content).await {
            Err(ForumError::Conflict { source, .. }) => {
                warn!(topic_id, error = %source, "Floor allocation conflicted, retrying once");
                coordinator::append_post(&self.pool, viewer, topic_id, &content).await?
            }
            other => other?,
        };

        info!(topic_id, floor = post.floor, post_id = post.id, "Appended post");
        Ok(post)
    }

    /// Fetches the post on one floor of a topic.
    pub async fn get(&self, topic_id: i64, floor: i64) -> Result<Option<Post>> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, topic_id, floor, updated_at, content
            FROM posts
            WHERE topic_id = ?1 AND floor = ?2
            "#,
        )
        .bind(topic_id)
        .bind(floor)
        .fetch_optional(&self.pool)
        .await
        .context("fetch post")
    }

    /// All live posts of a topic in floor order.
    pub async fn list(&self, topic_id: i64) -> Result<Vec<Post>> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, topic_id, floor, updated_at, content
            FROM posts
            WHERE topic_id = ?1
            ORDER BY floor ASC
            "#,
        )
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await
        .context("list posts")
    }

    /// Replaces a post's content. Floor and topic never change.
    pub async fn update(&self, topic_id: i64, floor: i64, content: &str) -> Result<Post> {
        let content = require_text("content", content, self.limits.max_content_length)?;

        let mut tx = self.pool.begin().await.context("begin post update")?;
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET content = ?3, updated_at = ?4
            WHERE topic_id = ?1 AND floor = ?2
            RETURNING id, topic_id, floor, updated_at, content
            "#,
        )
        .bind(topic_id)
        .bind(floor)
        .bind(&content)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .context("update post")?
        .ok_or(ForumError::NotFound("post"))?;
        tx.commit().await.context("commit post update")?;

        info!(topic_id, floor, "Updated post");
        Ok(post)
    }

    /// Removes exactly one post. Later floors keep their numbers and the
    /// topic's floor count is untouched, so the gap is permanent.
    pub async fn delete(&self, topic_id: i64, floor: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM posts WHERE topic_id = ?1 AND floor = ?2")
            .bind(topic_id)
            .bind(floor)
            .execute(&self.pool)
            .await
            .context("delete post")?
            .rows_affected();

        if deleted == 0 {
            return Err(ForumError::NotFound("post"));
        }
        info!(topic_id, floor, "Deleted post");
        Ok(())
    }
}
