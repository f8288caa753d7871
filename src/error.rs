use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ForumError>;

// SQLite extended result codes that mean another writer got in the way.
const SQLITE_BUSY_CODES: &[&str] = &["5", "6", "261", "262", "517", "773"];

#[derive(Debug, Error)]
pub enum ForumError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("access denied")]
    AccessDenied,

    #[error("conflicting write during {context}")]
    Conflict {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("storage failure during {context}")]
    Storage {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to apply database migrations")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("invalid configuration")]
    Config(#[from] envconfig::Error),
}

impl ForumError {
    pub fn validation(message: impl Into<String>) -> Self {
        ForumError::Validation(message.into())
    }

    /// Wraps a driver error with the operation it interrupted, separating
    /// write conflicts from every other storage failure.
    pub fn from_sqlx(context: &'static str, source: sqlx::Error) -> Self {
        if is_conflict(&source) {
            ForumError::Conflict { context, source }
        } else {
            ForumError::Storage { context, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ForumError::NotFound(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ForumError::Validation(_) => StatusCode::BAD_REQUEST,
            // Privileged content must not reveal that it exists.
            ForumError::NotFound(_) | ForumError::AccessDenied => StatusCode::NOT_FOUND,
            ForumError::Conflict { .. } => StatusCode::CONFLICT,
            ForumError::Storage { .. } | ForumError::Migration(_) | ForumError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn is_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                || db_err
                    .code()
                    .is_some_and(|code| SQLITE_BUSY_CODES.contains(&&*code))
        }
        _ => false,
    }
}

/// Attaches an operation label to raw `sqlx` results.
pub trait StorageContext<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T> StorageContext<T> for std::result::Result<T, sqlx::Error> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|source| ForumError::from_sqlx(context, source))
    }
}

impl IntoResponse for ForumError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ForumError::Validation(_) => self.to_string(),
            ForumError::NotFound(_) | ForumError::AccessDenied => "Not found".to_string(),
            ForumError::Conflict { context, source } => {
                error!(error = %source, context, "Write conflict surfaced to caller");
                "Conflicting write, please retry".to_string()
            }
            ForumError::Storage { context, source } => {
                error!(error = %source, context, "Storage failure");
                "Server error".to_string()
            }
            ForumError::Migration(e) => {
                error!(error = %e, "Migration failure");
                "Server error".to_string()
            }
            ForumError::Config(e) => {
                error!(error = %e, "Configuration failure");
                "Server error".to_string()
            }
        };
        (status, message).into_response()
    }
}
