//! # Events
//!
//! Event types exchanged over the message transport and the JSON codec
//! that wraps them in envelopes.
//!
//! - `post-created` / `post-deleted`: produced by the HTTP write path,
//!   consumed by the fan-out handlers
//! - `feed-updated`: produced by the fan-out handlers, consumed by live
//!   streams
//! - `post-updated`: produced on deletion, consumed by per-post streams

mod codec;
mod errors;
mod event;

pub use codec::{decode, encode, Envelope};
pub use errors::{CodecError, CodecResult};
pub use event::{
    Event, FeedUpdated, PostCreated, PostDeleted, PostUpdated, FEED_UPDATED_TOPIC,
    POST_CREATED_TOPIC, POST_DELETED_TOPIC, POST_UPDATED_TOPIC,
};
