pub mod api;
pub mod state;
pub mod view;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use crate::http::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api", get(api::api_root))
        .route("/api/", get(api::api_root))
        .route("/api/{id}", get(api::api_browse))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
