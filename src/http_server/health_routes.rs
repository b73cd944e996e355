//! Health check route

use std::sync::Arc;

use axum::extract::State;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use super::server::AppState;
use crate::router::RouterState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub router: RouterState,
    pub version: String,
}

pub fn health_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// 200 while the message router runs, 503 otherwise
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let router = state.router.state();
    let (status, label) = match router {
        RouterState::Running => (StatusCode::OK, "ok"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };

    let response = HealthResponse {
        status: label.to_string(),
        router,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            router: RouterState::Running,
            version: "0.1.0".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["router"], "running");
    }
}
