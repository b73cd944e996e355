//! # Fan-out Events
//!
//! The post lifecycle events and the derived feed notification.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::Post;

/// Topic carrying [`PostCreated`]
pub const POST_CREATED_TOPIC: &str = "post-created";

/// Topic carrying [`PostDeleted`]
pub const POST_DELETED_TOPIC: &str = "post-deleted";

/// Topic carrying [`PostUpdated`]
pub const POST_UPDATED_TOPIC: &str = "post-updated";

/// Topic carrying [`FeedUpdated`]
pub const FEED_UPDATED_TOPIC: &str = "feed-updated";

/// An event with a fixed transport topic
pub trait Event: Serialize + DeserializeOwned + Send + Sync {
    const TOPIC: &'static str;
}

/// A post was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCreated {
    pub post: Post,
    pub occurred_at: DateTime<Utc>,
}

impl PostCreated {
    pub fn new(post: Post) -> Self {
        Self {
            post,
            occurred_at: Utc::now(),
        }
    }
}

impl Event for PostCreated {
    const TOPIC: &'static str = POST_CREATED_TOPIC;
}

/// A post was deleted; carries the snapshot taken before the row was removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDeleted {
    #[serde(rename = "original_post")]
    pub deleted_post: Post,
    pub occurred_at: DateTime<Utc>,
}

impl PostDeleted {
    pub fn new(deleted_post: Post) -> Self {
        Self {
            deleted_post,
            occurred_at: Utc::now(),
        }
    }
}

impl Event for PostDeleted {
    const TOPIC: &'static str = POST_DELETED_TOPIC;
}

/// A post changed; `new_post` is `None` when the post was removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUpdated {
    pub original_post: Post,
    #[serde(default)]
    pub new_post: Option<Post>,
    pub occurred_at: DateTime<Utc>,
}

impl PostUpdated {
    /// Notice that a post no longer exists
    pub fn removed(original_post: Post) -> Self {
        Self {
            original_post,
            new_post: None,
            occurred_at: Utc::now(),
        }
    }
}

impl Event for PostUpdated {
    const TOPIC: &'static str = POST_UPDATED_TOPIC;
}

/// A feed's membership changed. Carries no content; readers re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedUpdated {
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

impl FeedUpdated {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            occurred_at: Utc::now(),
        }
    }
}

impl Event for FeedUpdated {
    const TOPIC: &'static str = FEED_UPDATED_TOPIC;
}
