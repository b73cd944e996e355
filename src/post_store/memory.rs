//! # In-Memory Post Store

use std::sync::RwLock;

use async_trait::async_trait;

use super::errors::{PostStoreError, PostStoreResult};
use super::PostStore;
use crate::model::Post;

/// Process-local post store keeping creation order
#[derive(Debug, Default)]
pub struct InMemoryPostStore {
    posts: RwLock<Vec<Post>>,
}

fn poisoned<T>(_: T) -> PostStoreError {
    PostStoreError::Internal("Lock poisoned".into())
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn insert_post(&self, post: Post) -> PostStoreResult<Option<Post>> {
        let mut posts = self.posts.write().map_err(poisoned)?;
        if posts.iter().any(|p| p.id == post.id) {
            return Ok(None);
        }
        posts.push(post.clone());
        Ok(Some(post))
    }

    async fn list_posts(&self) -> PostStoreResult<Vec<Post>> {
        let posts = self.posts.read().map_err(poisoned)?;
        Ok(posts.clone())
    }

    async fn get_post(&self, id: &str) -> PostStoreResult<Option<Post>> {
        let posts = self.posts.read().map_err(poisoned)?;
        Ok(posts.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_post(&self, id: &str) -> PostStoreResult<bool> {
        let mut posts = self.posts.write().map_err(poisoned)?;
        let before = posts.len();
        posts.retain(|p| p.id != id);
        Ok(posts.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CreatePostRequest, User};

    fn request(tags: &[&str]) -> CreatePostRequest {
        CreatePostRequest {
            title: "title".to_string(),
            content: "content".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryPostStore::new();
        let post = store
            .create_post(request(&["tech"]), &User::anonymous())
            .await
            .unwrap()
            .unwrap();

        let found = store.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(found, post);
        assert!(store.get_post("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = InMemoryPostStore::new();
        let post = Post::with_id("p1", request(&[]), &User::anonymous());

        assert!(store.insert_post(post.clone()).await.unwrap().is_some());
        assert!(store.insert_post(post).await.unwrap().is_none());
        assert_eq!(store.list_posts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_keeps_order() {
        let store = InMemoryPostStore::new();
        for id in ["p1", "p2", "p3"] {
            store
                .insert_post(Post::with_id(id, request(&[]), &User::anonymous()))
                .await
                .unwrap();
        }

        assert!(store.delete_post("p2").await.unwrap());
        assert!(!store.delete_post("p2").await.unwrap());

        let ids: Vec<String> = store
            .list_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p1", "p3"]);
    }
}
