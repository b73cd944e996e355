//! Feed stream routes

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::{routing::get, Router};

use super::server::AppState;
use crate::events::FEED_UPDATED_TOPIC;
use crate::stream::{live_stream, AllFeedsStream, FeedStream};

pub fn feed_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(all_feeds_handler))
        .route("/:name", get(feed_handler))
        .with_state(state)
}

/// Stream `{"feeds": [...]}`, refreshed on every feed change
async fn all_feeds_handler(State(state): State<Arc<AppState>>) -> Response {
    let adapter = Arc::new(AllFeedsStream::new(Arc::clone(&state.feeds)));
    live_stream(adapter, state.transport(), FEED_UPDATED_TOPIC, String::new()).await
}

/// Stream one feed, refreshed when that feed changes
async fn feed_handler(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    let adapter = Arc::new(FeedStream::new(Arc::clone(&state.feeds)));
    live_stream(adapter, state.transport(), FEED_UPDATED_TOPIC, name).await
}
