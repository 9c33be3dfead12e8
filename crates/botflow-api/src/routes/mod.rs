//! Route table for the bot-flow REST API.

mod flows;
mod nodes;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use botflow_engine::FlowService;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FlowService>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/bot-flows", post(flows::create).get(flows::list))
        .route(
            "/bot-flows/:id",
            get(flows::get_one).put(flows::update).delete(flows::delete),
        )
        .route("/bot-flows/:id/duplicate", post(flows::duplicate))
        .route("/bot-flows/:id/publish", post(flows::publish))
        .route("/bot-flows/:id/relink", post(nodes::relink))
        .route("/bot-flows/:id/nodes", post(nodes::create))
        .route("/bot-flows/:id/nodes/bulk", post(nodes::create_bulk))
        .route(
            "/bot-flows/:id/nodes/:nodeId",
            put(nodes::update).delete(nodes::delete),
        )
        .with_state(state)
}
