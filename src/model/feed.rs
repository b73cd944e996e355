//! # Feeds
//!
//! A feed is the materialized list of posts carrying one topic tag.

use serde::{Deserialize, Serialize};

use super::post::Post;

/// Posts currently associated with one topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Topic name, unique across feeds
    pub name: String,

    /// Post snapshots in insertion order, at most one per post id
    #[serde(default)]
    pub posts: Vec<Post>,
}

impl Feed {
    /// Create an empty feed
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            posts: Vec::new(),
        }
    }

    /// Whether a post with this id is a member
    pub fn contains(&self, post_id: &str) -> bool {
        self.posts.iter().any(|p| p.id == post_id)
    }

    /// Number of member posts
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Add a post unless one with the same id is present.
    ///
    /// Returns whether the feed changed.
    pub fn insert(&mut self, post: &Post) -> bool {
        if self.contains(&post.id) {
            return false;
        }
        self.posts.push(post.clone());
        true
    }

    /// Remove the post with this id, returning whether it was present
    pub fn remove(&mut self, post_id: &str) -> bool {
        let before = self.posts.len();
        self.posts.retain(|p| p.id != post_id);
        self.posts.len() != before
    }

    pub fn summary(&self) -> FeedSummary {
        FeedSummary {
            name: self.name.clone(),
            posts: self.posts.len(),
        }
    }
}

/// Feed name with its post count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSummary {
    pub name: String,
    pub posts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CreatePostRequest, User};

    fn post(id: &str) -> Post {
        Post::with_id(
            id,
            CreatePostRequest {
                title: String::new(),
                content: String::new(),
                tags: vec!["tech".to_string()],
            },
            &User::anonymous(),
        )
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut feed = Feed::new("tech");
        assert!(feed.insert(&post("p1")));
        assert!(!feed.insert(&post("p1")));
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut feed = Feed::new("tech");
        feed.insert(&post("p1"));
        assert!(!feed.remove("p2"));
        assert_eq!(feed.len(), 1);
        assert!(feed.remove("p1"));
        assert!(feed.is_empty());
    }

    #[test]
    fn test_summary_counts_posts() {
        let mut feed = Feed::new("tech");
        feed.insert(&post("p1"));
        feed.insert(&post("p2"));
        assert_eq!(
            feed.summary(),
            FeedSummary {
                name: "tech".to_string(),
                posts: 2
            }
        );
    }
}
