use constant_time_eq::constant_time_eq;
use tracing::warn;

use crate::{
    config::ForumConfig,
    error::{ForumError, Result},
    models::Visibility,
};

/// Identity of the caller as far as the forum cares: admin or anonymous guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Admin,
    Guest,
}

impl Viewer {
    pub fn from_privileged(is_privileged: bool) -> Self {
        if is_privileged {
            Viewer::Admin
        } else {
            Viewer::Guest
        }
    }

    pub fn is_privileged(self) -> bool {
        matches!(self, Viewer::Admin)
    }

    pub fn can_read(self, visibility: Visibility) -> bool {
        self.is_privileged() || visibility.is_public()
    }

    pub fn can_post_in(self, visibility: Visibility) -> bool {
        self.is_privileged() || visibility.guests_may_post()
    }

    /// Rejects guests attempting an admin-only action.
    pub fn require_admin(self, action: &'static str) -> Result<()> {
        if self.is_privileged() {
            Ok(())
        } else {
            warn!(action, "Guest attempted admin-only action");
            Err(ForumError::AccessDenied)
        }
    }
}

/// Turns whatever credential the transport carried into a [`Viewer`].
pub trait Authenticator: Send + Sync {
    fn identify(&self, credential: Option<&str>) -> Viewer;
}

const BEARER_PREFIX: &str = "Bearer ";

/// Grants admin to callers presenting the configured token. With no token
/// configured, everybody is a guest.
#[derive(Clone)]
pub struct AdminToken {
    token: Option<String>,
}

impl AdminToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn from_config(config: &ForumConfig) -> Self {
        Self::new(config.admin_token.clone())
    }
}

impl std::fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminToken")
            .field("configured", &self.token.is_some())
            .finish()
    }
}

impl Authenticator for AdminToken {
    fn identify(&self, credential: Option<&str>) -> Viewer {
        let (Some(expected), Some(presented)) = (self.token.as_deref(), credential) else {
            return Viewer::Guest;
        };
        let presented = presented.strip_prefix(BEARER_PREFIX).unwrap_or(presented);
        Viewer::from_privileged(constant_time_eq(expected.as_bytes(), presented.as_bytes()))
    }
}
