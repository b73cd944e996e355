//! # MySQL Post Store

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Opts, Pool};
use tracing::info;

use super::errors::{PostStoreError, PostStoreResult};
use super::PostStore;
use crate::model::Post;

/// MySQL error code for a duplicate key
const ER_DUP_ENTRY: u16 = 1062;

const CREATE_POSTS: &str = r"
CREATE TABLE IF NOT EXISTS posts (
    seq BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
    id VARCHAR(64) NOT NULL UNIQUE,
    post JSON NOT NULL
) CHARACTER SET utf8mb4";

/// Relational post store
#[derive(Debug)]
pub struct MySqlPostStore {
    pool: Pool,
}

fn backend_error(e: mysql_async::Error) -> PostStoreError {
    PostStoreError::Backend(e.to_string())
}

fn parse_post(id: &str, json: &str) -> PostStoreResult<Post> {
    serde_json::from_str(json).map_err(|e| PostStoreError::Corrupt {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

impl MySqlPostStore {
    /// Connect and create the schema if it does not exist
    pub async fn connect(connection_string: &str) -> PostStoreResult<Self> {
        let opts = Opts::from_url(connection_string)
            .map_err(|e| PostStoreError::Unavailable(format!("invalid connection string: {}", e)))?;
        let pool = Pool::new(opts);

        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| PostStoreError::Unavailable(e.to_string()))?;
        conn.query_drop(CREATE_POSTS).await.map_err(backend_error)?;
        drop(conn);

        info!("MySQL post store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl PostStore for MySqlPostStore {
    async fn insert_post(&self, post: Post) -> PostStoreResult<Option<Post>> {
        let json =
            serde_json::to_string(&post).map_err(|e| PostStoreError::Internal(e.to_string()))?;

        let mut conn = self.pool.get_conn().await.map_err(backend_error)?;
        match conn
            .exec_drop(
                "INSERT INTO posts (id, post) VALUES (?, ?)",
                (post.id.as_str(), json.as_str()),
            )
            .await
        {
            Ok(()) => Ok(Some(post)),
            Err(mysql_async::Error::Server(e)) if e.code == ER_DUP_ENTRY => Ok(None),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn list_posts(&self) -> PostStoreResult<Vec<Post>> {
        let mut conn = self.pool.get_conn().await.map_err(backend_error)?;
        let rows: Vec<(String, String)> = conn
            .query("SELECT id, CAST(post AS CHAR) FROM posts ORDER BY seq")
            .await
            .map_err(backend_error)?;

        rows.iter().map(|(id, json)| parse_post(id, json)).collect()
    }

    async fn get_post(&self, id: &str) -> PostStoreResult<Option<Post>> {
        let mut conn = self.pool.get_conn().await.map_err(backend_error)?;
        let row: Option<String> = conn
            .exec_first("SELECT CAST(post AS CHAR) FROM posts WHERE id = ?", (id,))
            .await
            .map_err(backend_error)?;

        row.map(|json| parse_post(id, &json)).transpose()
    }

    async fn delete_post(&self, id: &str) -> PostStoreResult<bool> {
        let mut conn = self.pool.get_conn().await.map_err(backend_error)?;
        conn.exec_drop("DELETE FROM posts WHERE id = ?", (id,))
            .await
            .map_err(backend_error)?;
        Ok(conn.affected_rows() > 0)
    }
}
