use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use miniopg_core::config::ConfigStore;
use miniopg_core::storage::StoreConnector;
use serde::Serialize;
use tokio::sync::watch;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::error::BridgeError;
use crate::upload::upload;

/// Shared state for every request.
#[derive(Clone)]
pub struct AppState {
    pub(crate) config_store: Arc<ConfigStore>,
    pub(crate) connector: Arc<dyn StoreConnector>,
    pub(crate) max_body_bytes: usize,
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(
        config_store: ConfigStore,
        connector: Arc<dyn StoreConnector>,
        max_body_bytes: usize,
        shutdown: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            config_store: Arc::new(config_store),
            connector,
            max_body_bytes,
            shutdown,
        }
    }
}

/// `OPTIONS` on any path is answered here; other unmatched requests get 404.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(upload).fallback(fallback))
        .route("/shutdown", post(shutdown).fallback(fallback))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, GET, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(state)
}

async fn fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        BridgeError::NotFound.into_response()
    }
}

#[derive(Debug, Serialize)]
struct ShutdownResponse {
    success: bool,
    message: &'static str,
}

/// Lets a newly started bridge take over the port from this one.
async fn shutdown(State(state): State<AppState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested over HTTP");
    state.shutdown.send_replace(true);
    Json(ShutdownResponse {
        success: true,
        message: "Shutting down",
    })
}
