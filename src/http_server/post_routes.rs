//! Post routes
//!
//! Writes go through the post store and announce themselves on the
//! transport; feeds are updated asynchronously by the fan-out handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{info, warn};

use super::server::{error_response, AppState};
use crate::events::{PostCreated, PostDeleted, PostUpdated, FEED_UPDATED_TOPIC, POST_UPDATED_TOPIC};
use crate::model::{CreatePostRequest, User};
use crate::stream::{live_stream, AllPostsStream, PostStream};
use crate::transport::publish_event;

pub fn post_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(all_posts_handler).post(create_post_handler))
        .route("/:id", get(post_handler).delete(delete_post_handler))
        .with_state(state)
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, Response> {
    state.auth.validate(headers).map_err(|e| {
        warn!(error = %e, "Request rejected by authentication");
        error_response(e.status_code(), e.to_string())
    })
}

/// Create a post and publish `PostCreated`
async fn create_post_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(400, rejection.body_text()),
    };

    let post = match state.posts.create_post(request, &user).await {
        Ok(Some(post)) => post,
        Ok(None) => return error_response(409, "Post already exists"),
        Err(e) => return error_response(e.status_code(), e.to_string()),
    };

    let transport = state.transport();
    if let Err(e) = publish_event(transport.as_ref(), &PostCreated::new(post.clone())).await {
        warn!(post_id = %post.id, error = %e, "Failed to publish post-created");
        return error_response(400, e.to_string());
    }

    info!(post_id = %post.id, tags = ?post.tags, "Post created");
    (StatusCode::CREATED, Json(post)).into_response()
}

/// Delete a post, publish `PostDeleted`, then tell live readers it is gone
async fn delete_post_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(response) = authenticate(&state, &headers) {
        return response;
    }

    let post = match state.posts.get_post(&id).await {
        Ok(Some(post)) => post,
        Ok(None) => return error_response(404, "Not found"),
        Err(e) => return error_response(e.status_code(), e.to_string()),
    };

    match state.posts.delete_post(&id).await {
        Ok(true) => {}
        Ok(false) => return error_response(404, "Not found"),
        Err(e) => return error_response(e.status_code(), e.to_string()),
    }

    let transport = state.transport();
    if let Err(e) = publish_event(transport.as_ref(), &PostDeleted::new(post.clone())).await {
        warn!(post_id = %id, error = %e, "Failed to publish post-deleted");
        return error_response(400, e.to_string());
    }

    if let Err(e) = publish_event(transport.as_ref(), &PostUpdated::removed(post)).await {
        warn!(post_id = %id, error = %e, "Failed to publish post-updated");
    }

    info!(post_id = %id, "Post deleted");
    StatusCode::NO_CONTENT.into_response()
}

/// Stream every post, refreshed whenever any feed changes
async fn all_posts_handler(State(state): State<Arc<AppState>>) -> Response {
    let adapter = Arc::new(AllPostsStream::new(Arc::clone(&state.posts)));
    live_stream(adapter, state.transport(), FEED_UPDATED_TOPIC, String::new()).await
}

/// Stream one post until it is deleted
async fn post_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let adapter = Arc::new(PostStream::new(Arc::clone(&state.posts)));
    live_stream(adapter, state.transport(), POST_UPDATED_TOPIC, id).await
}
