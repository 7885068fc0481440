pub mod health;
pub mod sessions;

use axum::{routing::get, routing::post, Router};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/sessions/start", post(sessions::handle_start))
        .route("/sessions/turn", post(sessions::handle_turn))
        .with_state(state)
}
