//! Flow-level handlers: CRUD, duplication, and the publish gate.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use botflow_engine::{CreateFlowRequest, FlowFilter, FlowStatus, UpdateFlowRequest};

use crate::response::{ok, ApiError};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<FlowStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateFlowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let flow = state.service.create_flow(req).await?;
    Ok(ok(flow))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = FlowFilter {
        status: query.status,
        page: query.page,
        limit: query.limit,
    };
    let page = state.service.list_flows(&filter).await?;
    Ok(ok(page))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let flow = state.service.get_flow(&id).await?;
    Ok(ok(flow))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFlowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let flow = state.service.update_flow(&id, req).await?;
    Ok(ok(flow))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.delete_flow(&id).await?;
    Ok(ok(()))
}

pub async fn duplicate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let flow = state.service.duplicate_flow(&id).await?;
    Ok(ok(flow))
}

pub async fn publish(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let flow = state.service.publish(&id).await?;
    Ok(ok(flow))
}
