use crate::server::handlers;
use crate::server::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let index = ServeFile::new(state.paths.static_dir.join("index.html"));
    let audio = ServeDir::new(&state.paths.voices_dir);
    Router::new()
        .route_service("/", index)
        .route("/api/get-session-samples", get(handlers::get_session_samples))
        .route("/api/save-result", post(handlers::save_result))
        .route("/api/save-session", post(handlers::save_session))
        .route("/api/stats", get(handlers::stats))
        .route("/api/health", get(handlers::health_check))
        .nest_service("/audio", audio)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
