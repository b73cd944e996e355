//! # Post Store
//!
//! CRUD over posts. Deleting a post here does not touch feeds; the
//! fan-out handlers do that from the `post-deleted` event.

mod errors;
mod memory;
#[cfg(feature = "mysql")]
mod mysql;

pub use errors::{PostStoreError, PostStoreResult};
pub use memory::InMemoryPostStore;
#[cfg(feature = "mysql")]
pub use mysql::MySqlPostStore;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Mode, StorageConfig};
use crate::model::{CreatePostRequest, Post, User};

#[async_trait]
pub trait PostStore: Send + Sync + Debug {
    /// Store a post; `None` when a post with the same id exists
    async fn insert_post(&self, post: Post) -> PostStoreResult<Option<Post>>;

    /// Build a post authored by `user` and store it
    async fn create_post(
        &self,
        request: CreatePostRequest,
        user: &User,
    ) -> PostStoreResult<Option<Post>> {
        self.insert_post(Post::new(request, user)).await
    }

    /// All posts, oldest first
    async fn list_posts(&self) -> PostStoreResult<Vec<Post>>;

    async fn get_post(&self, id: &str) -> PostStoreResult<Option<Post>>;

    /// Returns whether the post existed
    async fn delete_post(&self, id: &str) -> PostStoreResult<bool>;
}

/// Open the post store for the configured mode
pub async fn open_post_store(
    mode: Mode,
    config: &StorageConfig,
) -> PostStoreResult<Arc<dyn PostStore>> {
    match mode {
        Mode::InMemory | Mode::Document => {
            info!(mode = %mode, "Using in-memory post store");
            Ok(Arc::new(InMemoryPostStore::new()))
        }
        Mode::Persistent => open_persistent(config).await,
    }
}

#[cfg(feature = "mysql")]
async fn open_persistent(config: &StorageConfig) -> PostStoreResult<Arc<dyn PostStore>> {
    let url = config.connection_string.as_deref().ok_or_else(|| {
        PostStoreError::Unavailable("posts_storage.connection_string is not set".into())
    })?;
    info!(mode = "persistent", "Using MySQL post store");
    Ok(Arc::new(MySqlPostStore::connect(url).await?))
}

#[cfg(not(feature = "mysql"))]
async fn open_persistent(_config: &StorageConfig) -> PostStoreResult<Arc<dyn PostStore>> {
    Err(PostStoreError::Unavailable(
        "persistent mode requires the `mysql` feature".into(),
    ))
}
