//! Node types — the steps of a conversation graph.
//!
//! `NodeConfig` is a tagged union discriminated by `type`, serialized
//! adjacently as `{"type": ..., "config": {...}}` so the compiler enforces
//! the required fields per kind instead of runtime property probing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Message,
    Menu,
    Input,
    Condition,
    ApiCall,
    TransferAgent,
    End,
}

impl NodeKind {
    /// Terminal kinds hand control away from the bot — no outgoing edge.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::TransferAgent | Self::End)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Message => "message",
            Self::Menu => "menu",
            Self::Input => "input",
            Self::Condition => "condition",
            Self::ApiCall => "api_call",
            Self::TransferAgent => "transfer_agent",
            Self::End => "end",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Per-kind configuration
// ---------------------------------------------------------------------------

/// Configuration of a node, discriminated by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum NodeConfig {
    Message(MessageConfig),
    Menu(MenuConfig),
    Input(InputConfig),
    Condition(ConditionConfig),
    ApiCall(ApiCallConfig),
    TransferAgent(TransferConfig),
    End(EndConfig),
}

impl NodeConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Message(_) => NodeKind::Message,
            Self::Menu(_) => NodeKind::Menu,
            Self::Input(_) => NodeKind::Input,
            Self::Condition(_) => NodeKind::Condition,
            Self::ApiCall(_) => NodeKind::ApiCall,
            Self::TransferAgent(_) => NodeKind::TransferAgent,
            Self::End(_) => NodeKind::End,
        }
    }
}

/// Sends a text message, optionally with WhatsApp interactive buttons.
/// `message` may contain `{{variable}}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct MessageConfig {
    pub message: String,
    #[serde(default)]
    pub use_buttons: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<MessageButton>,
}

/// One interactive button.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct MessageButton {
    pub id: String,
    pub text: String,
}

/// Presents a list of options; each option may carry its own target,
/// falling back to the node's `nextNodeId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct MenuConfig {
    pub options: Vec<MenuOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct MenuOption {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node_id: Option<String>,
}

/// Prompts the debtor and stores the reply in a flow variable.
///
/// Re-prompt on a failed validation is runtime behavior, not a graph
/// edge — the node's only outgoing edge is `nextNodeId` on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    pub message: String,
    pub input_type: InputType,
    /// Must name a variable declared in the flow's `variables`.
    pub variable_name: String,
    #[serde(default)]
    pub validation: InputValidation,
}

/// What the runtime accepts for an `input` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum InputType {
    Text,
    Number,
    Email,
    Phone,
    Date,
    Document,
}

/// Validation rules applied by the runtime before accepting input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct InputValidation {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Branches on a flow variable. Each branch carries its own target;
/// `elseNodeId` catches the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    /// Default variable the branches test.
    pub variable: String,
    pub conditions: Vec<ConditionBranch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub else_node_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ConditionBranch {
    /// Overrides the node-level variable when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    pub operator: ConditionOperator,
    pub value: Value,
    /// May be unset while the graph is being built; relinked afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    Exists,
}

/// Calls an external endpoint and maps response fields into flow
/// variables. Execution is the runtime's concern; the graph model only
/// validates shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ApiCallConfig {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Response field path → flow variable name.
    #[serde(default)]
    pub response_mapping: BTreeMap<String, String>,
}

/// Hands the conversation to a human agent. Terminal for bot control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct TransferConfig {
    pub message: String,
    pub transfer_reason: String,
}

/// Ends the conversation. Terminal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct EndConfig {}

// ---------------------------------------------------------------------------
// BotNode
// ---------------------------------------------------------------------------

/// One step in a conversation graph.
///
/// Nodes reference each other by string ID, never by pointer — the graph
/// must survive serialization and the store's whole-document snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct BotNode {
    pub id: String,
    pub flow_id: String,
    pub name: String,
    #[serde(flatten)]
    pub config: NodeConfig,
    /// Default/unconditional successor. Absent on terminal nodes and on
    /// condition nodes that fully branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node_id: Option<String>,
    /// Canvas coordinates. Presentational only.
    #[serde(default)]
    pub position_x: i32,
    #[serde(default)]
    pub position_y: i32,
}

impl BotNode {
    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }

    /// Every transition target this node carries, in declaration order.
    pub fn reference_targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = Vec::new();
        if let Some(next) = &self.next_node_id {
            targets.push(next);
        }
        match &self.config {
            NodeConfig::Menu(cfg) => {
                for option in &cfg.options {
                    if let Some(t) = &option.next_node_id {
                        targets.push(t);
                    }
                }
            }
            NodeConfig::Condition(cfg) => {
                for branch in &cfg.conditions {
                    if let Some(t) = &branch.next_node_id {
                        targets.push(t);
                    }
                }
                if let Some(t) = &cfg.else_node_id {
                    targets.push(t);
                }
            }
            _ => {}
        }
        targets
    }

    /// Rewrite every transition target through `map`. Targets absent from
    /// the map are left untouched — duplication remaps only IDs it minted.
    pub fn remap_targets(&mut self, map: &BTreeMap<String, String>) {
        let remap = |slot: &mut Option<String>| {
            if let Some(old) = slot.as_ref() {
                if let Some(new) = map.get(old) {
                    *slot = Some(new.clone());
                }
            }
        };
        remap(&mut self.next_node_id);
        match &mut self.config {
            NodeConfig::Menu(cfg) => {
                for option in &mut cfg.options {
                    remap(&mut option.next_node_id);
                }
            }
            NodeConfig::Condition(cfg) => {
                for branch in &mut cfg.conditions {
                    remap(&mut branch.next_node_id);
                }
                remap(&mut cfg.else_node_id);
            }
            _ => {}
        }
    }
}
