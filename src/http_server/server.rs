//! # HTTP Server
//!
//! Combines the endpoint routers with CORS and request tracing.

use std::future::Future;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::config::HttpServerConfig;
use super::feed_routes::feed_routes;
use super::health_routes::health_routes;
use super::post_routes::post_routes;
use crate::auth::AuthValidator;
use crate::feed_store::FeedStore;
use crate::post_store::PostStore;
use crate::router::Router as MessageRouter;
use crate::transport::Transport;

/// Shared by every request handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub router: Arc<MessageRouter>,
    pub feeds: Arc<dyn FeedStore>,
    pub posts: Arc<dyn PostStore>,
    pub auth: AuthValidator,
}

impl AppState {
    pub fn new(
        router: Arc<MessageRouter>,
        feeds: Arc<dyn FeedStore>,
        posts: Arc<dyn PostStore>,
        auth: AuthValidator,
    ) -> Self {
        Self {
            router,
            feeds,
            posts,
            auth,
        }
    }

    /// Transport used for publishing and live streams
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.router.transport()
    }
}

/// JSON error body with the given status
pub fn error_response(status: u16, message: impl Into<String>) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: AppState) -> Self {
        let router = Self::build_router(&config, Arc::new(state));
        Self { config, router }
    }

    /// Build the combined router with all endpoints
    pub fn build_router(config: &HttpServerConfig, state: Arc<AppState>) -> Router {
        let origin = config.allow_origin.parse::<HeaderValue>().ok();
        if origin.is_none() {
            warn!(origin = %config.allow_origin, "Invalid CORS origin, cross-origin requests will be refused");
        }

        // Credentials are allowed, so every list must be explicit
        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::list(origin))
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true);

        Router::new()
            .merge(health_routes(Arc::clone(&state)))
            .nest("/api/tweets", post_routes(Arc::clone(&state)))
            .nest("/api/feeds", feed_routes(state))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` resolves and open connections drain
    pub async fn start<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        let local = listener.local_addr()?;
        info!(addr = %local, url = %self.config.public_url(), "HTTP server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
