//! # Live Streams
//!
//! Long-lived per-request streams that push a refreshed payload whenever a
//! matching message arrives on the transport.
//!
//! | Adapter          | Topic          | Predicate                          |
//! |------------------|----------------|------------------------------------|
//! | `FeedStream`     | `feed-updated` | `name == {name}`                   |
//! | `PostStream`     | `post-updated` | `original_post.id == {id}`         |
//! | `AllFeedsStream` | `feed-updated` | always                             |
//! | `AllPostsStream` | `feed-updated` | always                             |

mod adapter;
mod errors;
mod sse;

pub use adapter::{AllFeedsStream, AllPostsStream, FeedStream, PostStream, StreamAdapter};
pub use errors::{StreamError, StreamResult};
pub use sse::{live_stream, REMOVED_EVENT};
