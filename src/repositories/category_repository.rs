use sqlx::{sqlite::SqliteRow, FromRow, SqlitePool};
use tracing::info;

use crate::{
    auth::Viewer,
    config::Limits,
    coordinator,
    error::{ForumError, Result, StorageContext},
    models::{Category, CategoryUpdate, NewCategory, Visibility},
    utils::require_text,
};

/// Columns that can be read individually with [`CategoryRepository::query_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryField {
    Name,
    Visibility,
}

impl CategoryField {
    fn column(self) -> &'static str {
        match self {
            CategoryField::Name => "name",
            CategoryField::Visibility => "visibility",
        }
    }
}

#[derive(Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
    limits: Limits,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool, limits: Limits) -> Self {
        Self { pool, limits }
    }

    /// Inserts a new category.
    pub async fn create(&self, data: NewCategory) -> Result<Category> {
        let name = require_text("name", &data.name, self.limits.max_name_length)?;

        // Autocommit RETURNING can hand back the row before the write is
        // committed, so every RETURNING write runs in an explicit transaction.
        let mut tx = self.pool.begin().await.context("begin category insert")?;
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, visibility)
            VALUES (?1, ?2)
            RETURNING id, name, visibility
            "#,
        )
        .bind(&name)
        .bind(data.visibility)
        .fetch_one(&mut *tx)
        .await
        .context("insert category")?;
        tx.commit().await.context("commit category insert")?;

        info!(category_id = category.id, name = %category.name, visibility = ?category.visibility, "Created category");
        Ok(category)
    }

    /// Fetches a single category by its ID.
    pub async fn get(&self, category_id: i64) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, visibility
            FROM categories
            WHERE id = ?1
            "#,
        )
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch category")
    }

    pub async fn exists(&self, category_id: i64) -> Result<bool> {
        super::row_exists(&self.pool, "categories", category_id)
            .await
            .context("check category")
    }

    pub async fn query_field<T>(&self, category_id: i64, field: CategoryField) -> Result<Option<T>>
    where
        T: Send + Unpin,
        (T,): for<'r> FromRow<'r, SqliteRow>,
    {
        super::fetch_column(&self.pool, "categories", field.column(), category_id)
            .await
            .context("read category field")
    }

    /// Lists the categories the viewer may see, oldest first.
    pub async fn list(&self, viewer: Viewer) -> Result<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, visibility
            FROM categories
            WHERE ?1 OR visibility <> ?2
            ORDER BY id ASC
            "#,
        )
        .bind(viewer.is_privileged())
        .bind(Visibility::Hidden)
        .fetch_all(&self.pool)
        .await
        .context("list categories")
    }

    /// Renames and/or reclassifies a category. At least one field is required.
    pub async fn update(&self, category_id: i64, update: CategoryUpdate) -> Result<Category> {
        if update.is_empty() {
            return Err(ForumError::validation(
                "at least one of name or visibility must be supplied",
            ));
        }
        let name = update
            .name
            .as_deref()
            .map(|name| require_text("name", name, self.limits.max_name_length))
            .transpose()?;

        let mut tx = self.pool.begin().await.context("begin category update")?;
        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = COALESCE(?2, name),
                visibility = COALESCE(?3, visibility)
            WHERE id = ?1
            RETURNING id, name, visibility
            "#,
        )
        .bind(category_id)
        .bind(name)
        .bind(update.visibility)
        .fetch_optional(&mut *tx)
        .await
        .context("update category")?
        .ok_or(ForumError::NotFound("category"))?;
        tx.commit().await.context("commit category update")?;

        info!(category_id, name = %category.name, visibility = ?category.visibility, "Updated category");
        Ok(category)
    }

    /// Deletes a category, detaching its topics in the same transaction.
    /// Returns the number of detached topics.
    pub async fn delete(&self, category_id: i64) -> Result<u64> {
        let detached = coordinator::delete_category(&self.pool, category_id).await?;
        info!(category_id, detached_topics = detached, "Deleted category");
        Ok(detached)
    }
}
