//! # HTTP Server
//!
//! JSON API over posts and live feed streams.
//!
//! # Endpoints
//!
//! - `/health` - Liveness and router state
//! - `/api/tweets` - Create, stream and delete posts
//! - `/api/feeds` - Stream feeds by topic

pub mod config;
pub mod feed_routes;
pub mod health_routes;
pub mod post_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use server::{AppState, HttpServer};
