//! feedline - topic feed fan-out and live streaming for short posts
//!
//! Posts are written through the HTTP API and announced on a message
//! transport. The router delivers those announcements to the fan-out
//! handlers, which maintain one feed per topic tag and announce each feed
//! change for live readers.

pub mod auth;
pub mod cli;
pub mod config;
pub mod events;
pub mod fanout;
pub mod feed_store;
pub mod http_server;
pub mod model;
pub mod observability;
pub mod post_store;
pub mod router;
pub mod stream;
pub mod transport;
