//! Bot conversation flow engine — graph model, validation, and lifecycle.
//!
//! This crate provides the data model and editing service for WhatsApp
//! bot conversation flows: a named directed graph of typed nodes
//! (messages, menus, inputs, conditions, API calls, agent transfers)
//! whose structure is kept consistent through bulk creation, relinking,
//! and a validation-gated publish lifecycle. The runtime that walks a
//! published graph during live conversations is a separate service and
//! consumes flows through the store.
//!
//! The crate is designed to be embedded: no web server, no database —
//! persistence is the [`FlowStore`] trait with file and in-memory
//! defaults.

pub mod defaults;
pub mod errors;
pub mod registry;
pub mod service;
pub mod traits;
pub mod types;
pub mod validate;

// Re-export public types at the crate level.

// defaults
pub use defaults::{FileFlowStore, MemoryFlowStore};

// errors
pub use errors::{FlowError, FlowStoreError};

// registry
pub use registry::validate_config;

// service
pub use service::{
    CreateFlowRequest, CreateNodeRequest, FlowService, RelinkEdit, RelinkField,
    UpdateFlowRequest, UpdateNodeRequest,
};

// traits
pub use traits::{FlowFilter, FlowPage, FlowStore};

// types
pub use types::{
    ApiCallConfig, BotFlow, BotNode, ConditionBranch, ConditionConfig, ConditionOperator,
    EndConfig, FlowSettings, FlowStatus, FlowSummary, FlowVariable, InputConfig, InputType,
    InputValidation, MenuConfig, MenuOption, MessageButton, MessageConfig, NodeConfig, NodeKind,
    TransferConfig, VariableType, FLOW_SCHEMA_VERSION, MAX_WHATSAPP_BUTTONS,
};

// validate
pub use validate::{validate_flow, ValidationReport};
