use sqlx::{sqlite::SqliteRow, FromRow, SqlitePool};
use tracing::{debug, info};

use crate::{
    auth::Viewer,
    config::Limits,
    coordinator,
    error::{ForumError, Result, StorageContext},
    models::{CreatedTopic, NewTopic, Post, Topic, TopicUpdate, TopicWithPosts, Visibility, UNCATEGORIZED},
    utils::{contains_pattern, require_text, Page, PageParams},
};

/// Columns that can be read individually with [`TopicRepository::query_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicField {
    CreatedAt,
    Title,
    CategoryId,
    FloorCount,
}

impl TopicField {
    fn column(self) -> &'static str {
        match self {
            TopicField::CreatedAt => "created_at",
            TopicField::Title => "title",
            TopicField::CategoryId => "category_id",
            TopicField::FloorCount => "floor_count",
        }
    }
}

#[derive(Clone)]
pub struct TopicRepository {
    pool: SqlitePool,
    limits: Limits,
}

impl TopicRepository {
    pub fn new(pool: SqlitePool, limits: Limits) -> Self {
        Self { pool, limits }
    }

    /// Opens a topic in an existing category together with its first post.
    pub async fn create(&self, data: NewTopic) -> Result<CreatedTopic> {
        self.create_as(Viewer::Admin, data).await
    }

    /// Like [`create`](Self::create), but a guest is refused unless the
    /// category is guest-postable when the topic is written.
    pub async fn create_as(&self, viewer: Viewer, data: NewTopic) -> Result<CreatedTopic> {
        let title = require_text("title", &data.title, self.limits.max_title_length)?;
        let content = require_text("content", &data.content, self.limits.max_content_length)?;

        // Fail fast; the insert re-checks inside its transaction.
        if !self.category_exists(data.category_id).await? {
            debug!(category_id = data.category_id, "Topic rejected, category does not exist");
            return Err(ForumError::NotFound("category"));
        }

        let created = coordinator::open_topic(&self.pool, viewer, &title, data.category_id, &content).await?;
        info!(topic_id = created.topic.id, category_id = created.topic.category_id, "Created topic");
        Ok(created)
    }

    /// Fetches a single topic by its ID, regardless of visibility.
    pub async fn get(&self, topic_id: i64) -> Result<Option<Topic>> {
        sqlx::query_as::<_, Topic>(
            r#"
            SELECT id, created_at, title, category_id, floor_count
            FROM topics
            WHERE id = ?1
            "#,
        )
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch topic")
    }

    pub async fn exists(&self, topic_id: i64) -> Result<bool> {
        super::row_exists(&self.pool, "topics", topic_id)
            .await
            .context("check topic")
    }

    pub async fn query_field<T>(&self, topic_id: i64, field: TopicField) -> Result<Option<T>>
    where
        T: Send + Unpin,
        (T,): for<'r> FromRow<'r, SqliteRow>,
    {
        super::fetch_column(&self.pool, "topics", field.column(), topic_id)
            .await
            .context("read topic field")
    }

    /// Changes title and/or category. A category that differs from the
    /// current one must exist at the time of the update.
    pub async fn update(&self, topic_id: i64, update: TopicUpdate) -> Result<Topic> {
        if update.is_empty() {
            return Err(ForumError::validation(
                "at least one of title or category_id must be supplied",
            ));
        }
        let title = update
            .title
            .as_deref()
            .map(|title| require_text("title", title, self.limits.max_title_length))
            .transpose()?;

        let topic = coordinator::update_topic(&self.pool, topic_id, title.as_deref(), update.category_id).await?;
        info!(topic_id, category_id = topic.category_id, "Updated topic");
        Ok(topic)
    }

    /// Deletes a topic and all of its posts. Returns the number of posts removed.
    pub async fn delete(&self, topic_id: i64) -> Result<u64> {
        let posts = coordinator::delete_topic(&self.pool, topic_id).await?;
        info!(topic_id, deleted_posts = posts, "Deleted topic");
        Ok(posts)
    }

    /// Topic and its posts in floor order, read from one snapshot. Topics the
    /// viewer may not read are reported as missing.
    pub async fn get_with_posts(&self, topic_id: i64, viewer: Viewer) -> Result<TopicWithPosts> {
        let mut tx = self.pool.begin().await.context("begin topic read")?;

        let topic = sqlx::query_as::<_, Topic>(
            r#"
            SELECT id, created_at, title, category_id, floor_count
            FROM topics
            WHERE id = ?1
            "#,
        )
        .bind(topic_id)
        .fetch_optional(&mut *tx)
        .await
        .context("fetch topic")?
        .ok_or(ForumError::NotFound("topic"))?;

        if !viewer.is_privileged() {
            let visibility = if topic.is_uncategorized() {
                None
            } else {
                sqlx::query_scalar::<_, Visibility>("SELECT visibility FROM categories WHERE id = ?1")
                    .bind(topic.category_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .context("read category visibility")?
            };
            if !visibility.is_some_and(|v| viewer.can_read(v)) {
                debug!(topic_id, category_id = topic.category_id, "Hiding topic from guest");
                return Err(ForumError::NotFound("topic"));
            }
        }

        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, topic_id, floor, updated_at, content
            FROM posts
            WHERE topic_id = ?1
            ORDER BY floor ASC
            "#,
        )
        .bind(topic_id)
        .fetch_all(&mut *tx)
        .await
        .context("fetch topic posts")?;

        tx.commit().await.context("end topic read")?;
        Ok(TopicWithPosts { topic, posts })
    }

    /// Newest topics first, limited to what the viewer may read.
    pub async fn list(&self, viewer: Viewer, page: PageParams) -> Result<Page<Topic>> {
        let limit = page.limit(self.limits.page_size);
        let rows = sqlx::query_as::<_, Topic>(
            r#"
            SELECT t.id, t.created_at, t.title, t.category_id, t.floor_count
            FROM topics t
            WHERE ?1 OR EXISTS (
                SELECT 1 FROM categories c
                WHERE c.id = t.category_id AND c.visibility <> ?2
            )
            ORDER BY t.id DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(viewer.is_privileged())
        .bind(Visibility::Hidden)
        .bind(overfetch(limit))
        .bind(to_sql_int(page.offset()))
        .fetch_all(&self.pool)
        .await
        .context("list topics")?;

        Ok(Page::from_overfetch(rows, limit))
    }

    /// Newest topics of one category first. Visibility of the category itself
    /// is the caller's concern.
    pub async fn list_in_category(&self, category_id: i64, page: PageParams) -> Result<Page<Topic>> {
        let limit = page.limit(self.limits.page_size);
        let rows = sqlx::query_as::<_, Topic>(
            r#"
            SELECT id, created_at, title, category_id, floor_count
            FROM topics
            WHERE category_id = ?1
            ORDER BY id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(category_id)
        .bind(overfetch(limit))
        .bind(to_sql_int(page.offset()))
        .fetch_all(&self.pool)
        .await
        .context("list category topics")?;

        Ok(Page::from_overfetch(rows, limit))
    }

    /// Topics with at least one post containing `query`, newest first.
    pub async fn search(&self, viewer: Viewer, query: &str) -> Result<Vec<Topic>> {
        let query = query.trim();
        if query.chars().count() < self.limits.search_min_chars {
            return Err(ForumError::validation(format!(
                "search query needs at least {} characters",
                self.limits.search_min_chars
            )));
        }

        sqlx::query_as::<_, Topic>(
            r#"
            SELECT t.id, t.created_at, t.title, t.category_id, t.floor_count
            FROM topics t
            WHERE t.id IN (
                SELECT p.topic_id FROM posts p
                WHERE p.content LIKE ?1 ESCAPE '\'
            )
            AND (?2 OR EXISTS (
                SELECT 1 FROM categories c
                WHERE c.id = t.category_id AND c.visibility <> ?3
            ))
            ORDER BY t.id DESC
            "#,
        )
        .bind(contains_pattern(query))
        .bind(viewer.is_privileged())
        .bind(Visibility::Hidden)
        .fetch_all(&self.pool)
        .await
        .context("search topics")
    }

    async fn category_exists(&self, category_id: i64) -> Result<bool> {
        if category_id == UNCATEGORIZED {
            return Ok(false);
        }
        super::row_exists(&self.pool, "categories", category_id)
            .await
            .context("check category")
    }
}

fn overfetch(limit: u64) -> i64 {
    to_sql_int(limit.saturating_add(1))
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
