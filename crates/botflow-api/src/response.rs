//! Response envelope and error payloads.
//!
//! Every endpoint answers `{success, data, timestamp}` on success and
//! `{success, error, timestamp}` on failure. The error payload carries the
//! full validation error list so an editing UI can highlight every broken
//! node in one round trip.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use botflow_engine::FlowError;

/// Success envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

/// Wrap a payload in the success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
        timestamp: Utc::now(),
    })
}

/// Failure envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiErrorBody,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub kind: &'static str,
    pub message: String,
    /// Individual violations, for aggregate failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Error half of every handler's return type.
#[derive(Debug)]
pub struct ApiError(pub FlowError);

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            FlowError::UnknownFlow { .. } => (StatusCode::NOT_FOUND, "unknown_flow"),
            FlowError::NodeNotFound { .. } => (StatusCode::NOT_FOUND, "node_not_found"),
            FlowError::InvalidNodeConfig { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_node_config")
            }
            FlowError::DanglingReference { .. } => {
                (StatusCode::BAD_REQUEST, "dangling_reference")
            }
            FlowError::FlowNotPublishable { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "flow_not_publishable")
            }
            FlowError::DuplicateName { .. } => (StatusCode::CONFLICT, "duplicate_name"),
            FlowError::InvalidName => (StatusCode::BAD_REQUEST, "invalid_name"),
            FlowError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            FlowError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }

        let body = ApiErrorResponse {
            success: false,
            error: ApiErrorBody {
                kind,
                message: self.0.to_string(),
                errors: self
                    .0
                    .validation_errors()
                    .map(<[String]>::to_vec)
                    .unwrap_or_default(),
            },
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}
