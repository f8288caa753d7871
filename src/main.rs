use forum_core::{auth::Viewer, config::ForumConfig, Forum};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Creates or migrates the forum database named by the environment and
/// reports what it holds.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ForumConfig::from_env()?;
    info!(database_url = %config.database_url, "Preparing forum database");

    let forum = Forum::connect(&config).await?;
    let categories = forum.list_categories(Viewer::Admin).await?;
    for category in &categories {
        info!(id = category.id, name = %category.name, visibility = ?category.visibility, "Category");
    }
    info!(categories = categories.len(), "Forum database ready");

    forum.pool().close().await;
    Ok(())
}
