//! # Posts
//!
//! A post is immutable once created; only deletion changes its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::user::User;

/// Request body for creating a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// A single authored item of content with topic tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Opaque unique identifier
    pub id: String,

    pub title: String,

    pub content: String,

    /// Display name of the author
    pub author: String,

    /// Topic tags, ordered and free of duplicates
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post with a fresh id
    pub fn new(request: CreatePostRequest, author: &User) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), request, author)
    }

    /// Create a post with a caller-supplied id
    pub fn with_id(id: impl Into<String>, request: CreatePostRequest, author: &User) -> Self {
        Self {
            id: id.into(),
            title: request.title,
            content: request.content,
            author: author.display_name(),
            tags: dedup_tags(request.tags),
            created_at: Utc::now(),
        }
    }

    /// Whether the post carries the given tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Remove repeated tags, keeping the first occurrence of each
pub fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = Option::<Vec<String>>::deserialize(deserializer)?;
    Ok(dedup_tags(tags.unwrap_or_default()))
}
