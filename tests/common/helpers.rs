// tests/common/helpers.rs
//! Shared helper functions for integration tests
#![allow(dead_code)]

use forum_core::{
    auth::Viewer,
    config::ForumConfig,
    models::{Category, CreatedTopic, NewCategory, NewTopic, Post, Visibility},
    Forum,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// A forum backed by a fresh, migrated SQLite file that lives as long as this value.
pub struct TestSetup {
    pub forum: Forum,
    pub pool: SqlitePool,
    _dir: TempDir,
}

impl TestSetup {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut ForumConfig)) -> Self {
        init_tracing();

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let database_url = format!("sqlite://{}", dir.path().join("forum.db").display());
        let mut config = ForumConfig::for_database(database_url);
        adjust(&mut config);

        let forum = Forum::connect(&config)
            .await
            .expect("Failed to open test database");
        let pool = forum.pool().clone();

        Self {
            forum,
            pool,
            _dir: dir,
        }
    }

    /// Runs a `SELECT COUNT(*) ...` with a single id parameter.
    pub async fn count_where(&self, sql: &str, id: i64) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to run count query")
    }

    pub async fn topic_count(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM topics")
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count topics")
    }

    pub async fn post_count(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count posts")
    }

    pub async fn floor_count(&self, topic_id: i64) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT floor_count FROM topics WHERE id = ?1")
            .bind(topic_id)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to read floor_count")
    }

    pub async fn floors(&self, topic_id: i64) -> Vec<i64> {
        self.forum
            .posts
            .list(topic_id)
            .await
            .expect("Failed to list posts")
            .into_iter()
            .map(|post: Post| post.floor)
            .collect()
    }

    /// Makes every insert of a post with exactly this content fail.
    pub async fn reject_posts_with_content(&self, content: &str) {
        let sql = format!(
            "CREATE TRIGGER reject_content BEFORE INSERT ON posts \
             WHEN NEW.content = '{content}' \
             BEGIN SELECT RAISE(ABORT, 'rejected by test trigger'); END;"
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .expect("Failed to install test trigger");
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn create_test_category(forum: &Forum, name: &str, visibility: Visibility) -> Category {
    forum
        .create_category(Viewer::Admin, NewCategory::new(name, visibility))
        .await
        .expect("Failed to create category in helper")
}

pub async fn create_test_topic(
    forum: &Forum,
    category_id: i64,
    title: &str,
    content: &str,
) -> CreatedTopic {
    forum
        .create_topic(Viewer::Admin, NewTopic::new(title, category_id, content))
        .await
        .expect("Failed to create topic in helper")
}
