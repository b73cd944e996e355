//! # MySQL Feed Store
//!
//! Feeds and their memberships live in two tables. Post snapshots are
//! stored as JSON so readers never join against the post store.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Opts, Pool, TxOpts};
use tracing::info;

use super::errors::{FeedStoreError, FeedStoreResult};
use super::FeedStore;
use crate::model::{Feed, Post};

/// MySQL error code for a duplicate key
const ER_DUP_ENTRY: u16 = 1062;

const CREATE_FEEDS: &str = r"
CREATE TABLE IF NOT EXISTS feeds (
    name VARCHAR(255) NOT NULL PRIMARY KEY,
    created_at TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)
) CHARACTER SET utf8mb4";

const CREATE_FEED_POSTS: &str = r"
CREATE TABLE IF NOT EXISTS feed_posts (
    seq BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
    feed_name VARCHAR(255) NOT NULL,
    post_id VARCHAR(64) NOT NULL,
    post JSON NOT NULL,
    UNIQUE KEY feed_post (feed_name, post_id),
    FOREIGN KEY (feed_name) REFERENCES feeds (name) ON DELETE CASCADE
) CHARACTER SET utf8mb4";

/// Relational feed store
#[derive(Debug)]
pub struct MySqlFeedStore {
    pool: Pool,
}

fn backend_error(e: mysql_async::Error) -> FeedStoreError {
    FeedStoreError::Backend(e.to_string())
}

fn is_duplicate(e: &mysql_async::Error) -> bool {
    matches!(e, mysql_async::Error::Server(server) if server.code == ER_DUP_ENTRY)
}

fn parse_post(feed: &str, json: &str) -> FeedStoreResult<Post> {
    serde_json::from_str(json).map_err(|e| FeedStoreError::Corrupt {
        name: feed.to_string(),
        reason: e.to_string(),
    })
}

impl MySqlFeedStore {
    /// Connect and create the schema if it does not exist
    pub async fn connect(connection_string: &str) -> FeedStoreResult<Self> {
        let opts = Opts::from_url(connection_string)
            .map_err(|e| FeedStoreError::Unavailable(format!("invalid connection string: {}", e)))?;
        let store = Self {
            pool: Pool::new(opts),
        };
        store.migrate().await?;

        info!("MySQL feed store ready");
        Ok(store)
    }

    async fn migrate(&self) -> FeedStoreResult<()> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| FeedStoreError::Unavailable(e.to_string()))?;
        conn.query_drop(CREATE_FEEDS).await.map_err(backend_error)?;
        conn.query_drop(CREATE_FEED_POSTS)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    pub async fn disconnect(self) -> FeedStoreResult<()> {
        self.pool.disconnect().await.map_err(backend_error)
    }
}

#[async_trait]
impl FeedStore for MySqlFeedStore {
    async fn ensure_feed(&self, name: &str) -> FeedStoreResult<()> {
        let mut conn = self.pool.get_conn().await.map_err(backend_error)?;
        match conn
            .exec_drop("INSERT INTO feeds (name) VALUES (?)", (name,))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_duplicate(&e) => Ok(()),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn list_feeds(&self) -> FeedStoreResult<Vec<Feed>> {
        let mut conn = self.pool.get_conn().await.map_err(backend_error)?;
        let rows: Vec<(String, Option<String>)> = conn
            .query(
                "SELECT f.name, CAST(p.post AS CHAR) FROM feeds f \
                 LEFT JOIN feed_posts p ON p.feed_name = f.name \
                 ORDER BY f.created_at, f.name, p.seq",
            )
            .await
            .map_err(backend_error)?;

        let mut feeds: Vec<Feed> = Vec::new();
        for (name, post) in rows {
            if feeds.last().map(|f| f.name != name).unwrap_or(true) {
                feeds.push(Feed::new(name.clone()));
            }
            if let (Some(json), Some(feed)) = (post, feeds.last_mut()) {
                feed.posts.push(parse_post(&name, &json)?);
            }
        }
        Ok(feeds)
    }

    async fn get_feed(&self, name: &str) -> FeedStoreResult<Option<Feed>> {
        let mut conn = self.pool.get_conn().await.map_err(backend_error)?;
        let exists: Option<String> = conn
            .exec_first("SELECT name FROM feeds WHERE name = ?", (name,))
            .await
            .map_err(backend_error)?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows: Vec<String> = conn
            .exec(
                "SELECT CAST(post AS CHAR) FROM feed_posts WHERE feed_name = ? ORDER BY seq",
                (name,),
            )
            .await
            .map_err(backend_error)?;

        let mut feed = Feed::new(name);
        for json in rows {
            feed.posts.push(parse_post(name, &json)?);
        }
        Ok(Some(feed))
    }

    async fn append_post(&self, post: &Post) -> FeedStoreResult<()> {
        if post.tags.is_empty() {
            return Ok(());
        }
        let json =
            serde_json::to_string(post).map_err(|e| FeedStoreError::Internal(e.to_string()))?;

        let mut conn = self.pool.get_conn().await.map_err(backend_error)?;
        let mut tx = conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(backend_error)?;

        for tag in &post.tags {
            tx.exec_drop("INSERT IGNORE INTO feeds (name) VALUES (?)", (tag.as_str(),))
                .await
                .map_err(backend_error)?;
            tx.exec_drop(
                "INSERT IGNORE INTO feed_posts (feed_name, post_id, post) VALUES (?, ?, ?)",
                (tag.as_str(), post.id.as_str(), json.as_str()),
            )
            .await
            .map_err(backend_error)?;
        }

        tx.commit().await.map_err(backend_error)
    }

    async fn remove_post(&self, post: &Post) -> FeedStoreResult<()> {
        if post.tags.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.get_conn().await.map_err(backend_error)?;
        let mut tx = conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(backend_error)?;

        for tag in &post.tags {
            tx.exec_drop(
                "DELETE FROM feed_posts WHERE feed_name = ? AND post_id = ?",
                (tag.as_str(), post.id.as_str()),
            )
            .await
            .map_err(backend_error)?;
        }

        tx.commit().await.map_err(backend_error)
    }

    async fn delete_feed(&self, name: &str) -> FeedStoreResult<bool> {
        let mut conn = self.pool.get_conn().await.map_err(backend_error)?;
        conn.exec_drop("DELETE FROM feeds WHERE name = ?", (name,))
            .await
            .map_err(backend_error)?;
        Ok(conn.affected_rows() > 0)
    }
}
