use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::Page;

/// `category_id` value of a topic that belongs to no category.
pub const UNCATEGORIZED: i64 = 0;

/// Floor occupied by the opening post of every topic.
pub const FIRST_FLOOR: i64 = 1;

/// Who may see and post in a category.
///
/// Stored as the legacy integer depth (1, 2, 3). A boolean `public` flag maps
/// onto this as `true -> Normal` and `false -> Hidden`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Visibility {
    /// Readable by everyone, writable by admins.
    #[default]
    Normal = 1,
    /// Readable and writable by admins only.
    Hidden = 2,
    /// Readable by everyone; guests may also open topics and reply.
    GuestPostable = 3,
}

impl Visibility {
    pub fn from_public(public: bool) -> Self {
        if public {
            Visibility::Normal
        } else {
            Visibility::Hidden
        }
    }

    pub fn is_public(self) -> bool {
        !matches!(self, Visibility::Hidden)
    }

    pub fn guests_may_post(self) -> bool {
        matches!(self, Visibility::GuestPostable)
    }
}

/// A named grouping of topics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub visibility: Visibility,
}

/// A discussion thread. `floor_count` is the highest floor ever allocated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Topic {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub category_id: i64,
    pub floor_count: i64,
}

impl Topic {
    pub fn is_uncategorized(&self) -> bool {
        self.category_id == UNCATEGORIZED
    }
}

/// A single floor of a topic.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Post {
    pub id: i64,
    pub topic_id: i64,
    pub floor: i64,
    pub updated_at: DateTime<Utc>,
    pub content: String,
}

// Input data for creating a new category
#[derive(Deserialize, Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
}

impl NewCategory {
    pub fn new(name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            visibility,
        }
    }
}

/// Fields an admin may change on a category. `None` means "leave as is".
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
}

impl CategoryUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn reclassify(visibility: Visibility) -> Self {
        Self {
            visibility: Some(visibility),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.visibility.is_none()
    }
}

// Input data for opening a topic together with its first post
#[derive(Deserialize, Debug, Clone)]
pub struct NewTopic {
    pub title: String,
    pub category_id: i64,
    pub content: String,
}

impl NewTopic {
    pub fn new(title: impl Into<String>, category_id: i64, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            category_id,
            content: content.into(),
        }
    }
}

/// Fields an admin may change on a topic. `floor_count` and `id` are never
/// updatable.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TopicUpdate {
    pub title: Option<String>,
    pub category_id: Option<i64>,
}

impl TopicUpdate {
    pub fn retitle(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn move_to(category_id: i64) -> Self {
        Self {
            category_id: Some(category_id),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.category_id.is_none()
    }
}

/// A freshly opened topic and its opening post.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreatedTopic {
    pub topic: Topic,
    pub post: Post,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TopicWithPosts {
    pub topic: Topic,
    pub posts: Vec<Post>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CategoryWithTopics {
    pub category: Category,
    pub topics: Page<Topic>,
}
