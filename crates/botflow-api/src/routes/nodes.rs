//! Node-level handlers: creation (single and bulk), partial updates,
//! deletion, and transition relinking.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use botflow_engine::{CreateNodeRequest, RelinkEdit, UpdateNodeRequest};

use crate::response::{ok, ApiError};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkCreateRequest {
    pub nodes: Vec<CreateNodeRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RelinkRequest {
    pub edits: Vec<RelinkEdit>,
}

pub async fn create(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
    Json(req): Json<CreateNodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let node = state.service.create_node(&flow_id, req).await?;
    Ok(ok(node))
}

pub async fn create_bulk(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
    Json(req): Json<BulkCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let nodes = state.service.create_nodes_bulk(&flow_id, req.nodes).await?;
    Ok(ok(nodes))
}

pub async fn update(
    State(state): State<AppState>,
    Path((flow_id, node_id)): Path<(String, String)>,
    Json(req): Json<UpdateNodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let node = state.service.update_node(&flow_id, &node_id, req).await?;
    Ok(ok(node))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((flow_id, node_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.delete_node(&flow_id, &node_id).await?;
    Ok(ok(()))
}

pub async fn relink(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
    Json(req): Json<RelinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let flow = state.service.relink(&flow_id, req.edits).await?;
    Ok(ok(flow))
}
