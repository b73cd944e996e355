//! # Domain Model
//!
//! Posts, feeds and users shared by every layer.

mod feed;
mod post;
mod user;

pub use feed::{Feed, FeedSummary};
pub use post::{dedup_tags, CreatePostRequest, Post};
pub use user::User;
