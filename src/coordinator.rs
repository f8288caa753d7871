//! Transactions that touch more than one row or table.
//!
//! Each function opens one transaction, runs its steps in order and commits.
//! An early return drops the transaction, which rolls it back, so callers
//! observe either every step or none of them.
//!
//! Every transaction here starts with a write. SQLite then takes the write
//! lock before anything is read, and competing writers queue on the busy
//! timeout instead of acting on a stale snapshot.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::{
    auth::Viewer,
    error::{ForumError, Result, StorageContext},
    models::{CreatedTopic, Post, Topic, Visibility, FIRST_FLOOR, UNCATEGORIZED},
};

/// Inserts a topic at floor count 1 together with its opening post. Guests
/// may only open topics in guest-postable categories.
pub(crate) async fn open_topic(
    pool: &SqlitePool,
    viewer: Viewer,
    title: &str,
    category_id: i64,
    content: &str,
) -> Result<CreatedTopic> {
    let mut tx = pool.begin().await.context("begin topic creation")?;
    let now = Utc::now();

    // The category and its visibility are checked by the insert itself, so a
    // category deleted or reclassified after the caller's pre-check still
    // stops the topic from being written.
    let inserted = sqlx::query_as::<_, Topic>(
        r#"
        INSERT INTO topics (created_at, title, category_id, floor_count)
        SELECT ?1, ?2, ?3, ?4
        WHERE EXISTS (
            SELECT 1 FROM categories
            WHERE id = ?3 AND (?5 OR visibility = ?6)
        )
        RETURNING id, created_at, title, category_id, floor_count
        "#,
    )
    .bind(now)
    .bind(title)
    .bind(category_id)
    .bind(FIRST_FLOOR)
    .bind(viewer.is_privileged())
    .bind(Visibility::GuestPostable)
    .fetch_optional(&mut *tx)
    .await
    .context("insert topic")?;

    let Some(topic) = inserted else {
        let category_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE id = ?1)",
        )
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await
        .context("check category")?;
        if category_exists {
            debug!(category_id, "Guest topic refused inside transaction");
            return Err(ForumError::AccessDenied);
        }
        return Err(ForumError::NotFound("category"));
    };

    let post = insert_post(&mut tx, topic.id, FIRST_FLOOR, content, now).await?;

    tx.commit().await.context("commit topic creation")?;
    debug!(topic_id = topic.id, category_id, "Topic opened with first post");
    Ok(CreatedTopic { topic, post })
}

/// Allocates the next floor of a topic and writes the post into it. Guests
/// may only reply under guest-postable categories.
pub(crate) async fn append_post(
    pool: &SqlitePool,
    viewer: Viewer,
    topic_id: i64,
    content: &str,
) -> Result<Post> {
    let mut tx = pool.begin().await.context("begin post append")?;

    // Incrementing first both locks the topic row for this transaction and
    // reads back the floor this post owns.
    let allocated = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE topics
        SET floor_count = floor_count + 1
        WHERE id = ?1
          AND (?2 OR EXISTS (
              SELECT 1 FROM categories c
              WHERE c.id = topics.category_id AND c.visibility = ?3
          ))
        RETURNING floor_count
        "#,
    )
    .bind(topic_id)
    .bind(viewer.is_privileged())
    .bind(Visibility::GuestPostable)
    .fetch_optional(&mut *tx)
    .await
    .context("allocate floor")?;

    let Some(floor) = allocated else {
        let category_id = sqlx::query_scalar::<_, i64>(
            "SELECT category_id FROM topics WHERE id = ?1",
        )
        .bind(topic_id)
        .fetch_optional(&mut *tx)
        .await
        .context("check topic")?;
        return Err(match category_id {
            // Detached topics are invisible to guests.
            None | Some(UNCATEGORIZED) => ForumError::NotFound("topic"),
            Some(category_id) => {
                debug!(topic_id, category_id, "Guest reply refused inside transaction");
                ForumError::AccessDenied
            }
        });
    };

    let post = insert_post(&mut tx, topic_id, floor, content, Utc::now()).await?;

    tx.commit().await.context("commit post append")?;
    debug!(topic_id, floor, "Floor allocated");
    Ok(post)
}

/// Applies a topic update, re-checking a changed category inside the write.
pub(crate) async fn update_topic(
    pool: &SqlitePool,
    topic_id: i64,
    title: Option<&str>,
    category_id: Option<i64>,
) -> Result<Topic> {
    let mut tx = pool.begin().await.context("begin topic update")?;

    let updated = sqlx::query_as::<_, Topic>(
        r#"
        UPDATE topics
        SET title = COALESCE(?2, title),
            category_id = COALESCE(?3, category_id)
        WHERE id = ?1
          AND (?3 IS NULL
               OR ?3 = category_id
               OR EXISTS (SELECT 1 FROM categories WHERE id = ?3))
        RETURNING id, created_at, title, category_id, floor_count
        "#,
    )
    .bind(topic_id)
    .bind(title)
    .bind(category_id)
    .fetch_optional(&mut *tx)
    .await
    .context("update topic")?;

    let Some(topic) = updated else {
        // Nothing matched: either the topic is gone or the target category is.
        let topic_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM topics WHERE id = ?1)",
        )
        .bind(topic_id)
        .fetch_one(&mut *tx)
        .await
        .context("check topic")?;
        return Err(ForumError::NotFound(if topic_exists { "category" } else { "topic" }));
    };

    tx.commit().await.context("commit topic update")?;
    Ok(topic)
}

/// Deletes a category and moves its topics to uncategorized. Returns how many
/// topics were detached.
pub(crate) async fn delete_category(pool: &SqlitePool, category_id: i64) -> Result<u64> {
    let mut tx = pool.begin().await.context("begin category delete")?;

    let deleted = sqlx::query("DELETE FROM categories WHERE id = ?1")
        .bind(category_id)
        .execute(&mut *tx)
        .await
        .context("delete category")?
        .rows_affected();
    if deleted == 0 {
        return Err(ForumError::NotFound("category"));
    }

    let detached = sqlx::query("UPDATE topics SET category_id = ?1 WHERE category_id = ?2")
        .bind(UNCATEGORIZED)
        .bind(category_id)
        .execute(&mut *tx)
        .await
        .context("detach topics")?
        .rows_affected();

    tx.commit().await.context("commit category delete")?;
    debug!(category_id, detached, "Category deleted");
    Ok(detached)
}

/// Deletes a topic and every post under it. Returns how many posts went.
pub(crate) async fn delete_topic(pool: &SqlitePool, topic_id: i64) -> Result<u64> {
    let mut tx = pool.begin().await.context("begin topic delete")?;

    let posts = sqlx::query("DELETE FROM posts WHERE topic_id = ?1")
        .bind(topic_id)
        .execute(&mut *tx)
        .await
        .context("delete topic posts")?
        .rows_affected();

    let topics = sqlx::query("DELETE FROM topics WHERE id = ?1")
        .bind(topic_id)
        .execute(&mut *tx)
        .await
        .context("delete topic")?
        .rows_affected();
    if topics == 0 {
        return Err(ForumError::NotFound("topic"));
    }

    tx.commit().await.context("commit topic delete")?;
    debug!(topic_id, posts, "Topic deleted with posts");
    Ok(posts)
}

async fn insert_post(
    conn: &mut SqliteConnection,
    topic_id: i64,
    floor: i64,
    content: &str,
    at: DateTime<Utc>,
) -> Result<Post> {
    sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (topic_id, floor, updated_at, content)
        VALUES (?1, ?2, ?3, ?4)
        RETURNING id, topic_id, floor, updated_at, content
        "#,
    )
    .bind(topic_id)
    .bind(floor)
    .bind(at)
    .bind(content)
    .fetch_one(&mut *conn)
    .await
    .context("insert post")
}
