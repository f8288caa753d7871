//! Storage core of a small discussion board: categories hold topics, topics
//! hold sequentially floored posts.
//!
//! The repositories implement each entity's operations; [`Forum`] bundles
//! them and applies the admin/guest access policy.

use sqlx::SqlitePool;
use tracing::debug;

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod utils;

use auth::Viewer;
use config::{ForumConfig, Limits};
use error::{ForumError, Result};
use models::{
    Category, CategoryUpdate, CategoryWithTopics, CreatedTopic, NewCategory, NewTopic, Post, Topic,
    TopicUpdate, TopicWithPosts, Visibility, UNCATEGORIZED,
};
use repositories::{
    category_repository::{CategoryField, CategoryRepository},
    post_repository::PostRepository,
    topic_repository::{TopicField, TopicRepository},
};
use utils::{Page, PageParams};

/// Handle to the forum's stores. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Forum {
    pool: SqlitePool,
    pub categories: CategoryRepository,
    pub topics: TopicRepository,
    pub posts: PostRepository,
}

impl Forum {
    pub fn new(pool: SqlitePool, limits: Limits) -> Self {
        Self {
            categories: CategoryRepository::new(pool.clone(), limits),
            topics: TopicRepository::new(pool.clone(), limits),
            posts: PostRepository::new(pool.clone(), limits),
            pool,
        }
    }

    /// Connects, migrates and builds the stores from configuration.
    pub async fn connect(config: &ForumConfig) -> Result<Self> {
        let pool = db::connect(config).await?;
        Ok(Self::new(pool, config.limits()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // --- Categories ---

    pub async fn create_category(&self, viewer: Viewer, data: NewCategory) -> Result<Category> {
        viewer.require_admin("create category")?;
        self.categories.create(data).await
    }

    pub async fn update_category(
        &self,
        viewer: Viewer,
        category_id: i64,
        update: CategoryUpdate,
    ) -> Result<Category> {
        viewer.require_admin("update category")?;
        self.categories.update(category_id, update).await
    }

    pub async fn delete_category(&self, viewer: Viewer, category_id: i64) -> Result<u64> {
        viewer.require_admin("delete category")?;
        self.categories.delete(category_id).await
    }

    pub async fn list_categories(&self, viewer: Viewer) -> Result<Vec<Category>> {
        self.categories.list(viewer).await
    }

    /// A category and one page of its topics. Hidden categories look missing
    /// to guests.
    pub async fn category_with_topics(
        &self,
        viewer: Viewer,
        category_id: i64,
        page: PageParams,
    ) -> Result<CategoryWithTopics> {
        let category = self
            .categories
            .get(category_id)
            .await?
            .filter(|c| viewer.can_read(c.visibility))
            .ok_or(ForumError::NotFound("category"))?;
        let topics = self.topics.list_in_category(category_id, page).await?;
        Ok(CategoryWithTopics { category, topics })
    }

    // --- Topics ---

    /// Admins may open topics anywhere; guests only in guest-postable categories.
    pub async fn create_topic(&self, viewer: Viewer, data: NewTopic) -> Result<CreatedTopic> {
        if !viewer.is_privileged() {
            self.require_guest_postable(data.category_id).await?;
        }
        self.topics.create_as(viewer, data).await
    }

    pub async fn update_topic(&self, viewer: Viewer, topic_id: i64, update: TopicUpdate) -> Result<Topic> {
        viewer.require_admin("update topic")?;
        self.topics.update(topic_id, update).await
    }

    pub async fn delete_topic(&self, viewer: Viewer, topic_id: i64) -> Result<u64> {
        viewer.require_admin("delete topic")?;
        self.topics.delete(topic_id).await
    }

    pub async fn get_topic(&self, viewer: Viewer, topic_id: i64) -> Result<TopicWithPosts> {
        self.topics.get_with_posts(topic_id, viewer).await
    }

    pub async fn list_topics(&self, viewer: Viewer, page: PageParams) -> Result<Page<Topic>> {
        self.topics.list(viewer, page).await
    }

    pub async fn search_topics(&self, viewer: Viewer, query: &str) -> Result<Vec<Topic>> {
        self.topics.search(viewer, query).await
    }

    // --- Posts ---

    /// Admins may reply anywhere; guests only under guest-postable categories.
    pub async fn append_post(&self, viewer: Viewer, topic_id: i64, content: &str) -> Result<Post> {
        if !viewer.is_privileged() {
            let category_id = self
                .topics
                .query_field::<i64>(topic_id, TopicField::CategoryId)
                .await?
                .ok_or(ForumError::NotFound("topic"))?;
            // Guests cannot see detached topics, so they cannot reply to them either.
            if category_id == UNCATEGORIZED {
                return Err(ForumError::NotFound("topic"));
            }
            self.require_guest_postable(category_id).await?;
        }
        self.posts.append_as(viewer, topic_id, content).await
    }

    pub async fn update_post(&self, viewer: Viewer, topic_id: i64, floor: i64, content: &str) -> Result<Post> {
        viewer.require_admin("update post")?;
        self.posts.update(topic_id, floor, content).await
    }

    pub async fn delete_post(&self, viewer: Viewer, topic_id: i64, floor: i64) -> Result<()> {
        viewer.require_admin("delete post")?;
        self.posts.delete(topic_id, floor).await
    }

    async fn require_guest_postable(&self, category_id: i64) -> Result<()> {
        let visibility = self
            .categories
            .query_field::<Visibility>(category_id, CategoryField::Visibility)
            .await?;
        match visibility {
            Some(v) if Viewer::Guest.can_post_in(v) => Ok(()),
            Some(_) => {
                debug!(category_id, "Guest write refused in category");
                Err(ForumError::AccessDenied)
            }
            None => Err(ForumError::NotFound("category")),
        }
    }
}
