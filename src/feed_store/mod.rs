//! # Feed Store
//!
//! Durable or in-memory mapping from topic name to the posts carrying
//! that topic. Every mutation is idempotent so that redelivered messages
//! never duplicate or resurrect membership.
//!
//! ## Backends
//!
//! - [`InMemoryFeedStore`]: process-local, fine-grained per-feed locking
//! - [`DocumentFeedStore`]: one JSON document per feed on disk
//! - `MySqlFeedStore`: relational, behind the `mysql` feature

mod document;
mod errors;
mod memory;
#[cfg(feature = "mysql")]
mod mysql;

pub use document::DocumentFeedStore;
pub use errors::{FeedStoreError, FeedStoreResult};
pub use memory::InMemoryFeedStore;
#[cfg(feature = "mysql")]
pub use mysql::MySqlFeedStore;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Mode, StorageConfig};
use crate::model::{Feed, Post};

/// Topic-keyed materialized feeds
#[async_trait]
pub trait FeedStore: Send + Sync + Debug {
    /// Create the feed if absent; an existing feed is left untouched
    async fn ensure_feed(&self, name: &str) -> FeedStoreResult<()>;

    /// Snapshot of every feed, in creation order
    async fn list_feeds(&self) -> FeedStoreResult<Vec<Feed>>;

    /// `None` when no feed has this name; an empty feed is `Some`
    async fn get_feed(&self, name: &str) -> FeedStoreResult<Option<Feed>>;

    /// Add the post to the feed of each of its tags unless already present.
    /// Missing feeds are created.
    async fn append_post(&self, post: &Post) -> FeedStoreResult<()>;

    /// Remove the post from the feed of each of its tags. Missing feeds and
    /// missing posts are not errors.
    async fn remove_post(&self, post: &Post) -> FeedStoreResult<()>;

    /// Drop a feed, returning whether it existed
    async fn delete_feed(&self, name: &str) -> FeedStoreResult<bool>;
}

/// Open the feed store for the configured mode
pub async fn open_feed_store(
    mode: Mode,
    config: &StorageConfig,
) -> FeedStoreResult<Arc<dyn FeedStore>> {
    match mode {
        Mode::InMemory => {
            info!(mode = %mode, "Using in-memory feed store");
            Ok(Arc::new(InMemoryFeedStore::new()))
        }
        Mode::Document => {
            info!(mode = %mode, data_dir = %config.data_dir.display(), "Using document feed store");
            Ok(Arc::new(DocumentFeedStore::open(&config.data_dir).await?))
        }
        Mode::Persistent => open_persistent(config).await,
    }
}

#[cfg(feature = "mysql")]
async fn open_persistent(config: &StorageConfig) -> FeedStoreResult<Arc<dyn FeedStore>> {
    let url = config.connection_string.as_deref().ok_or_else(|| {
        FeedStoreError::Unavailable("feeds_storage.connection_string is not set".into())
    })?;
    info!(mode = "persistent", "Using MySQL feed store");
    Ok(Arc::new(MySqlFeedStore::connect(url).await?))
}

#[cfg(not(feature = "mysql"))]
async fn open_persistent(_config: &StorageConfig) -> FeedStoreResult<Arc<dyn FeedStore>> {
    Err(FeedStoreError::Unavailable(
        "persistent mode requires the `mysql` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_inmemory() {
        let store = open_feed_store(Mode::InMemory, &StorageConfig::default())
            .await
            .unwrap();
        store.ensure_feed("tech").await.unwrap();
        assert!(store.get_feed("tech").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_open_document() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig {
            connection_string: None,
            data_dir: temp.path().join("feeds"),
        };
        let store = open_feed_store(Mode::Document, &config).await.unwrap();
        store.ensure_feed("tech").await.unwrap();
        assert!(temp.path().join("feeds").is_dir());
    }

    #[cfg(not(feature = "mysql"))]
    #[tokio::test]
    async fn test_persistent_requires_feature() {
        let result = open_feed_store(Mode::Persistent, &StorageConfig::default()).await;
        assert!(matches!(result, Err(FeedStoreError::Unavailable(_))));
    }
}
