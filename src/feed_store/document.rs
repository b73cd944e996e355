//! # Document Feed Store
//!
//! One JSON document per feed under a data directory. File names are the
//! hex SHA-256 of the feed name, so any topic string maps to a safe path of
//! fixed length. The name itself is kept inside the document.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use uuid::Uuid;

use super::errors::{FeedStoreError, FeedStoreResult};
use super::FeedStore;
use crate::model::{Feed, Post};

const DOCUMENT_EXTENSION: &str = "json";

/// On-disk representation of a feed
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FeedDocument {
    name: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    posts: Vec<Post>,
}

impl FeedDocument {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            posts: Vec::new(),
        }
    }

    fn into_feed(self) -> Feed {
        Feed {
            name: self.name,
            posts: self.posts,
        }
    }
}

/// File-backed feed store
#[derive(Debug)]
pub struct DocumentFeedStore {
    root: PathBuf,
    /// Serializes read-modify-write per feed. Entries nobody holds are
    /// pruned on the next lookup.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

fn io_error(e: std::io::Error) -> FeedStoreError {
    FeedStoreError::Io(e.to_string())
}

impl DocumentFeedStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> FeedStoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(io_error)?;

        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, name: &str) -> PathBuf {
        let digest = Sha256::digest(name.as_bytes());
        self.root
            .join(format!("{}.{}", hex::encode(digest), DOCUMENT_EXTENSION))
    }

    fn lock_for(&self, name: &str) -> FeedStoreResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| FeedStoreError::Internal("Lock poisoned".into()))?;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(Arc::clone(locks.entry(name.to_string()).or_default()))
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    async fn read_path(path: &Path, name: &str) -> FeedStoreResult<Option<FeedDocument>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| FeedStoreError::Corrupt {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    async fn read_document(&self, name: &str) -> FeedStoreResult<Option<FeedDocument>> {
        Self::read_path(&self.document_path(name), name).await
    }

    /// Write through a temp file and rename, so readers never see a partial document
    async fn write_document(&self, document: &FeedDocument) -> FeedStoreResult<()> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| FeedStoreError::Internal(e.to_string()))?;

        let path = self.document_path(&document.name);
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));

        fs::write(&tmp, &bytes).await.map_err(io_error)?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_error(e));
        }
        Ok(())
    }
}

#[async_trait]
impl FeedStore for DocumentFeedStore {
    async fn ensure_feed(&self, name: &str) -> FeedStoreResult<()> {
        let lock = self.lock_for(name)?;
        let _guard = lock.lock().await;

        if self.read_document(name).await?.is_none() {
            self.write_document(&FeedDocument::new(name)).await?;
        }
        Ok(())
    }

    async fn list_feeds(&self) -> FeedStoreResult<Vec<Feed>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(io_error)?;
        let mut documents = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            let label = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            // Deleted between read_dir and read
            if let Some(document) = Self::read_path(&path, &label).await? {
                documents.push(document);
            }
        }

        documents.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(documents.into_iter().map(FeedDocument::into_feed).collect())
    }

    async fn get_feed(&self, name: &str) -> FeedStoreResult<Option<Feed>> {
        Ok(self.read_document(name).await?.map(FeedDocument::into_feed))
    }

    async fn append_post(&self, post: &Post) -> FeedStoreResult<()> {
        for tag in &post.tags {
            let lock = self.lock_for(tag)?;
            let _guard = lock.lock().await;

            let mut document = self
                .read_document(tag)
                .await?
                .unwrap_or_else(|| FeedDocument::new(tag));

            if document.posts.iter().any(|p| p.id == post.id) {
                continue;
            }
            document.posts.push(post.clone());
            self.write_document(&document).await?;
        }
        Ok(())
    }

    async fn remove_post(&self, post: &Post) -> FeedStoreResult<()> {
        for tag in &post.tags {
            let lock = self.lock_for(tag)?;
            let _guard = lock.lock().await;

            let Some(mut document) = self.read_document(tag).await? else {
                continue;
            };

            let before = document.posts.len();
            document.posts.retain(|p| p.id != post.id);
            if document.posts.len() != before {
                self.write_document(&document).await?;
            }
        }
        Ok(())
    }

    async fn delete_feed(&self, name: &str) -> FeedStoreResult<bool> {
        let lock = self.lock_for(name)?;
        let _guard = lock.lock().await;

        match fs::remove_file(self.document_path(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(e)),
        }
    }
}
