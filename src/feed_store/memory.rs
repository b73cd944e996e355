//! # In-Memory Feed Store
//!
//! The feed map sits behind one `RwLock`; every feed entry has its own
//! `Mutex`, so appends to different topics never contend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use super::errors::{FeedStoreError, FeedStoreResult};
use super::FeedStore;
use crate::model::{Feed, Post};

#[derive(Debug)]
struct FeedEntry {
    feed: Feed,
    /// Ids of member posts
    members: HashSet<String>,
    /// Creation order, used to list feeds stably
    order: u64,
}

/// Process-local feed store
#[derive(Debug, Default)]
pub struct InMemoryFeedStore {
    feeds: RwLock<HashMap<String, Arc<Mutex<FeedEntry>>>>,
    next_order: AtomicU64,
}

fn poisoned<T>(_: T) -> FeedStoreError {
    FeedStoreError::Internal("Lock poisoned".into())
}

impl InMemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, name: &str) -> FeedStoreResult<Option<Arc<Mutex<FeedEntry>>>> {
        let feeds = self.feeds.read().map_err(poisoned)?;
        Ok(feeds.get(name).cloned())
    }

    fn entry_or_create(&self, name: &str) -> FeedStoreResult<Arc<Mutex<FeedEntry>>> {
        if let Some(entry) = self.entry(name)? {
            return Ok(entry);
        }

        let mut feeds = self.feeds.write().map_err(poisoned)?;
        let entry = feeds.entry(name.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(FeedEntry {
                feed: Feed::new(name),
                members: HashSet::new(),
                order: self.next_order.fetch_add(1, Ordering::SeqCst),
            }))
        });
        Ok(Arc::clone(entry))
    }
}

#[async_trait]
impl FeedStore for InMemoryFeedStore {
    async fn ensure_feed(&self, name: &str) -> FeedStoreResult<()> {
        self.entry_or_create(name)?;
        Ok(())
    }

    async fn list_feeds(&self) -> FeedStoreResult<Vec<Feed>> {
        let entries: Vec<Arc<Mutex<FeedEntry>>> = {
            let feeds = self.feeds.read().map_err(poisoned)?;
            feeds.values().cloned().collect()
        };

        let mut snapshot = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.lock().map_err(poisoned)?;
            snapshot.push((entry.order, entry.feed.clone()));
        }
        snapshot.sort_by_key(|(order, _)| *order);

        Ok(snapshot.into_iter().map(|(_, feed)| feed).collect())
    }

    async fn get_feed(&self, name: &str) -> FeedStoreResult<Option<Feed>> {
        match self.entry(name)? {
            Some(entry) => {
                let entry = entry.lock().map_err(poisoned)?;
                Ok(Some(entry.feed.clone()))
            }
            None => Ok(None),
        }
    }

    async fn append_post(&self, post: &Post) -> FeedStoreResult<()> {
        for tag in &post.tags {
            let entry = self.entry_or_create(tag)?;
            let mut entry = entry.lock().map_err(poisoned)?;
            if entry.members.insert(post.id.clone()) {
                entry.feed.posts.push(post.clone());
            }
        }
        Ok(())
    }

    async fn remove_post(&self, post: &Post) -> FeedStoreResult<()> {
        for tag in &post.tags {
            if let Some(entry) = self.entry(tag)? {
                let mut entry = entry.lock().map_err(poisoned)?;
                if entry.members.remove(&post.id) {
                    entry.feed.remove(&post.id);
                }
            }
        }
        Ok(())
    }

    async fn delete_feed(&self, name: &str) -> FeedStoreResult<bool> {
        let mut feeds = self.feeds.write().map_err(poisoned)?;
        Ok(feeds.remove(name).is_some())
    }
}
