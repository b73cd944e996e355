//! # Fan-out Handlers
//!
//! Turn post lifecycle events into feed mutations and one `FeedUpdated`
//! notification per affected tag.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::{error, info};

use super::errors::{FanoutError, FanoutResult};
use crate::events::{decode, encode, Envelope, FeedUpdated, PostCreated, PostDeleted};
use crate::feed_store::FeedStore;
use crate::router::{HandlerResult, MessageHandler};

/// Consumer group of the creation handler
pub const POST_CREATED_HANDLER: &str = "update-feeds-on-post-created";

/// Consumer group of the deletion handler
pub const POST_DELETED_HANDLER: &str = "update-feeds-on-post-deleted";

/// Add a new post to the feed of every tag it carries.
///
/// Stops at the first store failure without emitting anything, so the
/// message can be redelivered against the idempotent store.
pub async fn on_post_created(
    envelope: &Envelope,
    store: &dyn FeedStore,
) -> FanoutResult<Vec<Envelope>> {
    let event: PostCreated = decode(envelope)?;
    let post = &event.post;

    if post.tags.is_empty() {
        info!(post_id = %post.id, "Post has no tags, no feeds to update");
        return Ok(Vec::new());
    }

    info!(post_id = %post.id, tags = ?post.tags, "Adding post to feeds");
    for tag in &post.tags {
        store.ensure_feed(tag).await?;
    }
    store.append_post(post).await?;

    feed_updated_envelopes(&post.tags)
}

/// Remove a deleted post from the feed of every tag it carried.
///
/// A store failure is logged and notifications are still emitted.
pub async fn on_post_deleted(
    envelope: &Envelope,
    store: &dyn FeedStore,
) -> FanoutResult<Vec<Envelope>> {
    let event: PostDeleted = decode(envelope)?;
    let post = &event.deleted_post;

    info!(post_id = %post.id, tags = ?post.tags, "Removing post from feeds");
    // TODO: nack on removal failure once readers tolerate redelivered deletes
    if let Err(e) = store.remove_post(post).await {
        error!(post_id = %post.id, error = %e, "Failed to remove post from feeds");
    }

    feed_updated_envelopes(&post.tags)
}

/// One `FeedUpdated` envelope per tag, in tag order
pub fn feed_updated_envelopes(tags: &[String]) -> FanoutResult<Vec<Envelope>> {
    tags.iter()
        .map(|tag| encode(&FeedUpdated::new(tag.clone())).map_err(FanoutError::from))
        .collect()
}

/// Router handler for `post-created`
#[derive(Debug, Clone)]
pub struct PostCreatedHandler {
    store: Arc<dyn FeedStore>,
}

impl PostCreatedHandler {
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self { store }
    }
}

impl MessageHandler for PostCreatedHandler {
    fn handle<'a>(&'a self, envelope: &'a Envelope) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            on_post_created(envelope, self.store.as_ref())
                .await
                .map_err(Into::into)
        })
    }
}

/// Router handler for `post-deleted`
#[derive(Debug, Clone)]
pub struct PostDeletedHandler {
    store: Arc<dyn FeedStore>,
}

impl PostDeletedHandler {
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self { store }
    }
}

impl MessageHandler for PostDeletedHandler {
    fn handle<'a>(&'a self, envelope: &'a Envelope) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            on_post_deleted(envelope, self.store.as_ref())
                .await
                .map_err(Into::into)
        })
    }
}
