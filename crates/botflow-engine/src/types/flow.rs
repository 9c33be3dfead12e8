//! Flow types — the named conversation blueprints that own node graphs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BotNode, FlowSettings, FlowStatus, FlowVariable, FLOW_SCHEMA_VERSION};

/// A named conversation blueprint.
///
/// A flow exclusively owns its nodes (composition): deleting the flow
/// deletes them, and duplication deep-copies them under fresh IDs. Nodes
/// live in a flat map keyed by ID — the graph is cross-referenced by
/// string IDs, never in-memory pointers, so whole flows serialize as one
/// consistent document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct BotFlow {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: FlowStatus,
    /// Entry point. Required before publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_node_id: Option<String>,
    /// Declared conversation-state slots, keyed by name.
    #[serde(default)]
    pub variables: BTreeMap<String, FlowVariable>,
    #[serde(default)]
    pub settings: FlowSettings,
    /// Owned nodes, keyed by node ID.
    #[serde(default)]
    pub nodes: BTreeMap<String, BotNode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_schema_version() -> u16 {
    FLOW_SCHEMA_VERSION
}

impl BotFlow {
    pub fn node(&self, node_id: &str) -> Option<&BotNode> {
        self.nodes.get(node_id)
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Lightweight listing record — a flow without its node graph.
///
/// List endpoints return summaries; the full document (with `nodes`) is
/// fetched per flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct FlowSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: FlowStatus,
    pub node_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&BotFlow> for FlowSummary {
    fn from(flow: &BotFlow) -> Self {
        Self {
            id: flow.id.clone(),
            name: flow.name.clone(),
            description: flow.description.clone(),
            status: flow.status,
            node_count: flow.nodes.len(),
            created_at: flow.created_at,
            updated_at: flow.updated_at,
        }
    }
}
