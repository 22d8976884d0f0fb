//! Axum router wiring.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;
use crate::dispatch::handlers;
use crate::{ops, policy};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ops::status_page))
        .route("/ping", get(ops::ping))
        .route("/update/", post(handlers::update_json))
        .route("/update/:kind/:id/:value", post(handlers::update_path))
        .route("/updates/", post(handlers::update_batch))
        .route("/value/", post(handlers::value_json))
        .route("/value/:kind/:id", get(handlers::value_path))
        .route_layer(middleware::from_fn_with_state(state.clone(), policy::guard::guard))
        .with_state(state)
}
