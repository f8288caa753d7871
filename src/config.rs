use envconfig::Envconfig;

use crate::error::Result;

#[derive(Envconfig, Debug, Clone)]
pub struct ForumConfig {
    #[envconfig(from = "DATABASE_URL", default = "sqlite://forum.db")]
    pub database_url: String,

    #[envconfig(from = "FORUM_MAX_CONNECTIONS", default = "8")]
    pub max_connections: u32,

    #[envconfig(from = "FORUM_ACQUIRE_TIMEOUT_SECONDS", default = "30")]
    pub acquire_timeout_seconds: u64,

    // Upper bound on how long a writer waits for the database lock.
    #[envconfig(from = "FORUM_BUSY_TIMEOUT_MS", default = "5000")]
    pub busy_timeout_ms: u64,

    #[envconfig(from = "FORUM_PAGE_SIZE", default = "20")]
    pub page_size: u64,

    #[envconfig(from = "FORUM_MAX_TITLE_LENGTH", default = "200")]
    pub max_title_length: usize,

    #[envconfig(from = "FORUM_MAX_NAME_LENGTH", default = "64")]
    pub max_name_length: usize,

    #[envconfig(from = "FORUM_MAX_CONTENT_LENGTH", default = "20000")]
    pub max_content_length: usize,

    #[envconfig(from = "FORUM_SEARCH_MIN_CHARS", default = "3")]
    pub search_min_chars: usize,

    #[envconfig(from = "FORUM_ADMIN_TOKEN")]
    pub admin_token: Option<String>,
}

impl ForumConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::init_from_env()?)
    }

    /// Default settings pointed at the given database.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        let limits = Limits::default();
        Self {
            database_url: database_url.into(),
            max_connections: 8,
            acquire_timeout_seconds: 30,
            busy_timeout_ms: 5000,
            page_size: limits.page_size,
            max_title_length: limits.max_title_length,
            max_name_length: limits.max_name_length,
            max_content_length: limits.max_content_length,
            search_min_chars: limits.search_min_chars,
            admin_token: None,
        }
    }

    pub fn limits(&self) -> Limits {
        Limits {
            page_size: self.page_size.max(1),
            max_title_length: self.max_title_length,
            max_name_length: self.max_name_length,
            max_content_length: self.max_content_length,
            search_min_chars: self.search_min_chars,
        }
    }
}

/// Input limits enforced before any transaction is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub page_size: u64,
    pub max_title_length: usize,
    pub max_name_length: usize,
    pub max_content_length: usize,
    pub search_min_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            page_size: 20,
            max_title_length: 200,
            max_name_length: 64,
            max_content_length: 20000,
            search_min_chars: 3,
        }
    }
}
