//! # Stream Adapters
//!
//! One adapter per stream kind. `response` renders the current state for a
//! route parameter; `validate` decides whether an envelope concerns it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::errors::StreamResult;
use crate::events::{decode, Envelope, FeedUpdated, PostUpdated};
use crate::feed_store::FeedStore;
use crate::model::FeedSummary;
use crate::post_store::PostStore;

#[async_trait]
pub trait StreamAdapter: Send + Sync {
    /// Current state for `param`; `None` when the resource does not exist
    async fn response(&self, param: &str) -> StreamResult<Option<Value>>;

    /// Whether `envelope` should refresh this client's stream
    fn validate(&self, param: &str, envelope: &Envelope) -> bool;
}

/// A single feed, refreshed when that feed is updated
#[derive(Debug, Clone)]
pub struct FeedStream {
    store: Arc<dyn FeedStore>,
}

impl FeedStream {
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StreamAdapter for FeedStream {
    async fn response(&self, name: &str) -> StreamResult<Option<Value>> {
        match self.store.get_feed(name).await? {
            Some(feed) => Ok(Some(serde_json::to_value(feed)?)),
            None => Ok(None),
        }
    }

    fn validate(&self, name: &str, envelope: &Envelope) -> bool {
        decode::<FeedUpdated>(envelope)
            .map(|event| event.name == name)
            .unwrap_or(false)
    }
}

/// A single post, refreshed when that post changes
#[derive(Debug, Clone)]
pub struct PostStream {
    posts: Arc<dyn PostStore>,
}

impl PostStream {
    pub fn new(posts: Arc<dyn PostStore>) -> Self {
        Self { posts }
    }
}

#[async_trait]
impl StreamAdapter for PostStream {
    async fn response(&self, id: &str) -> StreamResult<Option<Value>> {
        match self.posts.get_post(id).await? {
            Some(post) => Ok(Some(serde_json::to_value(post)?)),
            None => Ok(None),
        }
    }

    fn validate(&self, id: &str, envelope: &Envelope) -> bool {
        decode::<PostUpdated>(envelope)
            .map(|event| event.original_post.id == id)
            .unwrap_or(false)
    }
}

/// Summaries of every feed
#[derive(Debug, Clone)]
pub struct AllFeedsStream {
    store: Arc<dyn FeedStore>,
}

impl AllFeedsStream {
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StreamAdapter for AllFeedsStream {
    async fn response(&self, _param: &str) -> StreamResult<Option<Value>> {
        let feeds: Vec<FeedSummary> = self
            .store
            .list_feeds()
            .await?
            .iter()
            .map(|feed| feed.summary())
            .collect();
        Ok(Some(json!({ "feeds": feeds })))
    }

    fn validate(&self, _param: &str, _envelope: &Envelope) -> bool {
        true
    }
}

/// Every post
#[derive(Debug, Clone)]
pub struct AllPostsStream {
    posts: Arc<dyn PostStore>,
}

impl AllPostsStream {
    pub fn new(posts: Arc<dyn PostStore>) -> Self {
        Self { posts }
    }
}

#[async_trait]
impl StreamAdapter for AllPostsStream {
    async fn response(&self, _param: &str) -> StreamResult<Option<Value>> {
        let posts = self.posts.list_posts().await?;
        Ok(Some(serde_json::to_value(posts)?))
    }

    fn validate(&self, _param: &str, _envelope: &Envelope) -> bool {
        true
    }
}
