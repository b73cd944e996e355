//! # Fan-out
//!
//! Materializes feeds from post lifecycle events.
//!
//! - `post-created` → ensure a feed per tag, append the post, emit
//!   `FeedUpdated` per tag
//! - `post-deleted` → remove the post from each tag's feed, emit
//!   `FeedUpdated` per tag

mod errors;
mod handlers;

pub use errors::{FanoutError, FanoutResult};
pub use handlers::{
    feed_updated_envelopes, on_post_created, on_post_deleted, PostCreatedHandler,
    PostDeletedHandler, POST_CREATED_HANDLER, POST_DELETED_HANDLER,
};

use std::sync::Arc;

use crate::events::{FEED_UPDATED_TOPIC, POST_CREATED_TOPIC, POST_DELETED_TOPIC};
use crate::feed_store::FeedStore;
use crate::router::{Router, RouterResult};

/// Register both fan-out handlers on the router
pub fn register_handlers(router: &Router, store: Arc<dyn FeedStore>) -> RouterResult<()> {
    router.add_handler(
        POST_CREATED_HANDLER,
        POST_CREATED_TOPIC,
        Some(FEED_UPDATED_TOPIC),
        Arc::new(PostCreatedHandler::new(Arc::clone(&store))),
    )?;
    router.add_handler(
        POST_DELETED_HANDLER,
        POST_DELETED_TOPIC,
        Some(FEED_UPDATED_TOPIC),
        Arc::new(PostDeletedHandler::new(store)),
    )?;
    Ok(())
}
