pub mod api;
pub mod auth;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod health;
pub mod room_manager;
pub mod sse;
pub mod state;
pub mod store;
pub mod timer;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use config::ServerConfig;
use state::AppState;
use store::{InMemoryStore, RoomStore, StoreError};

/// Build the Axum router and application state from a config and store.
pub fn build_app(config: ServerConfig, store: Arc<dyn RoomStore>) -> (Router<()>, AppState) {
    let request_timeout = Duration::from_secs(config.limits.request_timeout_secs);
    let state = AppState::new(config, store);

    // The event stream is long-lived, so it stays outside the request timeout.
    let stream_routes = Router::new().route("/room/{room_id}/join", get(sse::join_room));

    let api_routes = Router::new()
        .route("/quiz/{quiz_id}/room", post(api::create_room))
        .route("/room/{room_id}/team", post(api::join_team))
        .route("/room/{room_id}/teams", get(api::teams))
        .route("/room/{room_id}/start", post(api::start_room))
        .route("/room/{room_id}/question", get(api::current_question))
        .route("/room/{room_id}/answer", post(api::submit_answer))
        .route("/room/{room_id}/scores", get(api::room_scores))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ));

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", api_routes.merge(stream_routes))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}

/// The store the server runs on: seeded from `seed_file` when configured.
pub fn build_store(config: &ServerConfig) -> Result<Arc<dyn RoomStore>, StoreError> {
    let store = match &config.seed_file {
        Some(path) => InMemoryStore::from_seed_file(path)?,
        None => {
            tracing::warn!("No seed file configured, starting with an empty store");
            InMemoryStore::new()
        },
    };
    Ok(Arc::new(store))
}
