//! Error types for flow store and graph editing operations.

use thiserror::Error;

use crate::types::FlowStatus;

/// Errors from [`FlowStore`](super::traits::FlowStore) implementations.
#[derive(Debug, Error)]
pub enum FlowStoreError {
    #[error("flow not found: {id}")]
    NotFound { id: String },
    #[error("flow store error: {message}")]
    Store { message: String },
}

/// Errors from [`FlowService`](super::service::FlowService) operations.
///
/// All variants are synchronous and locally recoverable — the service
/// never retries on the caller's behalf. Bulk operations abort whole,
/// carrying every violation found, never a partial commit.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow not found: {id}")]
    UnknownFlow { id: String },

    #[error("node not found: {id}")]
    NodeNotFound { id: String },

    #[error("invalid node config: {}", errors.join("; "))]
    InvalidNodeConfig { errors: Vec<String> },

    #[error("node {node_id} references unknown target {target_id}")]
    DanglingReference { node_id: String, target_id: String },

    #[error("flow is not publishable: {}", errors.join("; "))]
    FlowNotPublishable { errors: Vec<String> },

    #[error("a flow named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("flow name must not be empty")]
    InvalidName,

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: FlowStatus, to: FlowStatus },

    #[error(transparent)]
    Store(#[from] FlowStoreError),
}

impl FlowError {
    /// The validation error list carried by aggregate variants, if any.
    pub fn validation_errors(&self) -> Option<&[String]> {
        match self {
            Self::InvalidNodeConfig { errors } | Self::FlowNotPublishable { errors } => {
                Some(errors)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_error_lists_every_violation() {
        let err = FlowError::FlowNotPublishable {
            errors: vec!["No start node defined".into(), "Node a references unknown target b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("No start node defined"));
        assert!(msg.contains("unknown target b"));
        assert_eq!(err.validation_errors().unwrap().len(), 2);
    }
}
