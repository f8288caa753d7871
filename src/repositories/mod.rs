pub mod category_repository;
pub mod post_repository;
pub mod topic_repository;

use sqlx::{sqlite::SqliteRow, FromRow, SqlitePool};

/// Reads one column of one row by id without loading the rest of it.
/// `table` and `column` only ever come from the repositories' field enums.
async fn fetch_column<T>(
    pool: &SqlitePool,
    table: &'static str,
    column: &'static str,
    id: i64,
) -> Result<Option<T>, sqlx::Error>
where
    T: Send + Unpin,
    (T,): for<'r> FromRow<'r, SqliteRow>,
{
    let sql = format!("SELECT {column} FROM {table} WHERE id = ?1");
    sqlx::query_scalar::<_, T>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

async fn row_exists(pool: &SqlitePool, table: &'static str, id: i64) -> Result<bool, sqlx::Error> {
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = ?1)");
    sqlx::query_scalar::<_, bool>(&sql)
        .bind(id)
        .fetch_one(pool)
        .await
}
