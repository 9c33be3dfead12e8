//! Foundational types for the bot flow graph model.
//!
//! Every type here is `Serialize + Deserialize + Debug + Clone`. All map
//! fields use `BTreeMap` (never `HashMap`) to guarantee deterministic
//! serialization. Wire field names are camelCase to match the REST
//! contract consumed by the editor UI and seed scripts.

pub mod flow;
pub mod node;

// Re-export all types at module level.
pub use flow::*;
pub use node::*;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Current schema version for BotFlow serialization.
pub const FLOW_SCHEMA_VERSION: u16 = 1;

/// WhatsApp caps interactive messages at three buttons.
pub const MAX_WHATSAPP_BUTTONS: usize = 3;

// ---------------------------------------------------------------------------
// Flow status
// ---------------------------------------------------------------------------

/// Lifecycle status of a flow.
///
/// Flows are created in `Draft`. `Draft → Active` happens only through the
/// publish gate (full graph validation). `Active ↔ Inactive` are free
/// toggles, except that re-activation re-runs validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    #[default]
    Draft,
    Active,
    Inactive,
}

impl std::fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

// ---------------------------------------------------------------------------
// Flow variables
// ---------------------------------------------------------------------------

/// Type of a conversation-state slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Date,
}

/// A typed conversation-state slot declared by a flow.
///
/// `input` nodes write into these; `condition` nodes and `{{placeholder}}`
/// substitution read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct FlowVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Flow settings
// ---------------------------------------------------------------------------

/// Per-flow runtime configuration. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct FlowSettings {
    /// Minutes of debtor inactivity before the conversation times out.
    #[serde(default = "default_max_inactivity")]
    pub max_inactivity_time: u32,
    /// Hand the conversation to a human agent when a node errors.
    #[serde(default = "default_true")]
    pub transfer_to_agent_on_error: bool,
    /// Shown when the debtor's reply matches nothing the flow expects.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            max_inactivity_time: default_max_inactivity(),
            transfer_to_agent_on_error: default_true(),
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_max_inactivity() -> u32 {
    30
}

pub(crate) fn default_true() -> bool {
    true
}

fn default_fallback_message() -> String {
    "Lo siento, no entendí tu respuesta. ¿Podrías intentarlo de nuevo?".to_string()
}
