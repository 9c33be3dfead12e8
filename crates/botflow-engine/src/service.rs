//! Flow editing service — graph building, relinking, duplication, and the
//! status lifecycle.
//!
//! Structural mutations are serialized per flow: every read-modify-write
//! runs under that flow's lock, so concurrent editors (two supervisor
//! sessions, or a seed script racing manual edits) cannot lose updates.
//! Reads go straight to the store — flow documents are whole-document
//! snapshots, so no lock is needed for display.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::FlowError;
use crate::registry::validate_config;
use crate::traits::{FlowFilter, FlowPage, FlowStore};
use crate::types::{
    BotFlow, BotNode, FlowSettings, FlowStatus, FlowVariable, NodeConfig, NodeKind,
    FLOW_SCHEMA_VERSION,
};
use crate::validate::{validate_flow, ValidationReport};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlowRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, FlowVariable>,
    #[serde(default)]
    pub settings: FlowSettings,
}

/// Partial flow update. Also carries `startNodeId` and `status`, which is
/// how the REST contract expresses lifecycle transitions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFlowRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub variables: Option<BTreeMap<String, FlowVariable>>,
    #[serde(default)]
    pub settings: Option<FlowSettings>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_node_id: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<FlowStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeRequest {
    pub name: String,
    #[serde(flatten)]
    pub config: NodeConfig,
    #[serde(default)]
    pub next_node_id: Option<String>,
    #[serde(default)]
    pub position_x: i32,
    #[serde(default)]
    pub position_y: i32,
}

/// Partial node update.
///
/// `config` is a raw JSON object paired with an optional `type`; when
/// `type` is omitted the node's current kind is kept. `nextNodeId`
/// distinguishes "absent" (leave alone) from explicit `null` (clear).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNodeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<NodeKind>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "double_option")]
    pub next_node_id: Option<Option<String>>,
    #[serde(default)]
    pub position_x: Option<i32>,
    #[serde(default)]
    pub position_y: Option<i32>,
}

/// One transition-target rewrite inside a [`FlowService::relink`] batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelinkEdit {
    pub node_id: String,
    pub field: RelinkField,
    pub target_node_id: String,
}

/// Which transition slot a relink edit rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelinkField {
    /// The node's default successor.
    Next,
    /// A condition branch, by index.
    Condition { index: usize },
    /// The condition's else target.
    Else,
    /// A menu option's target, by index.
    Option { index: usize },
}

/// Missing field → `None`; explicit `null` → `Some(None)`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

// ---------------------------------------------------------------------------
// FlowService
// ---------------------------------------------------------------------------

/// Graph builder/editor and lifecycle controller over a [`FlowStore`].
pub struct FlowService {
    store: Arc<dyn FlowStore>,
    /// Per-flow write locks. Entries are created on first use and live for
    /// the service's lifetime.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FlowService {
    pub fn new(store: Arc<dyn FlowStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn flow_lock(&self, flow_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(flow_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, flow_id: &str) -> Result<BotFlow, FlowError> {
        self.store
            .get_flow(flow_id)
            .await?
            .ok_or_else(|| FlowError::UnknownFlow {
                id: flow_id.to_string(),
            })
    }

    async fn ensure_name_free(&self, name: &str, except_id: Option<&str>) -> Result<(), FlowError> {
        if let Some(existing) = self.store.find_by_name(name).await? {
            if except_id != Some(existing.id.as_str()) {
                return Err(FlowError::DuplicateName {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    // -- Flow CRUD ----------------------------------------------------------

    pub async fn create_flow(&self, req: CreateFlowRequest) -> Result<BotFlow, FlowError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(FlowError::InvalidName);
        }
        self.ensure_name_free(name, None).await?;

        let now = chrono::Utc::now();
        let flow = BotFlow {
            schema_version: FLOW_SCHEMA_VERSION,
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: req.description,
            status: FlowStatus::Draft,
            start_node_id: None,
            variables: req.variables,
            settings: req.settings,
            nodes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.put_flow(&flow).await?;
        info!(flow_id = %flow.id, name = %flow.name, "flow created");
        Ok(flow)
    }

    pub async fn get_flow(&self, flow_id: &str) -> Result<BotFlow, FlowError> {
        self.load(flow_id).await
    }

    pub async fn list_flows(&self, filter: &FlowFilter) -> Result<FlowPage, FlowError> {
        Ok(self.store.list_flows(filter).await?)
    }

    pub async fn update_flow(
        &self,
        flow_id: &str,
        req: UpdateFlowRequest,
    ) -> Result<BotFlow, FlowError> {
        let lock = self.flow_lock(flow_id).await;
        let _guard = lock.lock().await;

        let mut flow = self.load(flow_id).await?;

        if let Some(name) = &req.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(FlowError::InvalidName);
            }
            if name != flow.name {
                self.ensure_name_free(name, Some(&flow.id)).await?;
                flow.name = name.to_string();
            }
        }
        if let Some(description) = req.description {
            flow.description = description;
        }
        if let Some(variables) = req.variables {
            flow.variables = variables;
        }
        if let Some(settings) = req.settings {
            flow.settings = settings;
        }
        if let Some(start) = req.start_node_id {
            if let Some(node_id) = &start {
                if !flow.contains_node(node_id) {
                    return Err(FlowError::NodeNotFound {
                        id: node_id.clone(),
                    });
                }
            }
            flow.start_node_id = start;
        }
        if let Some(status) = req.status {
            self.transition(&mut flow, status)?;
        }

        flow.touch();
        self.store.put_flow(&flow).await?;
        Ok(flow)
    }

    pub async fn delete_flow(&self, flow_id: &str) -> Result<(), FlowError> {
        let lock = self.flow_lock(flow_id).await;
        let _guard = lock.lock().await;

        if !self.store.delete_flow(flow_id).await? {
            return Err(FlowError::UnknownFlow {
                id: flow_id.to_string(),
            });
        }
        info!(flow_id, "flow deleted");
        Ok(())
    }

    /// Deep-copy a flow and all its nodes under fresh IDs.
    ///
    /// Two passes inside one critical section: first mint an old→new ID
    /// map for every node, then rewrite every internal reference
    /// (`startNodeId`, `nextNodeId`, condition branches, menu options)
    /// through it. No reader can observe old and new IDs mixed. The copy
    /// is always a `Draft`, whatever the source's status.
    pub async fn duplicate_flow(&self, flow_id: &str) -> Result<BotFlow, FlowError> {
        let lock = self.flow_lock(flow_id).await;
        let _guard = lock.lock().await;

        let source = self.load(flow_id).await?;

        // Find a free copy name: "X (copy)", "X (copy 2)", ...
        let mut name = format!("{} (copy)", source.name);
        let mut n = 2;
        while self.store.find_by_name(&name).await?.is_some() {
            name = format!("{} (copy {n})", source.name);
            n += 1;
        }

        let new_flow_id = Uuid::new_v4().to_string();
        let id_map: BTreeMap<String, String> = source
            .nodes
            .keys()
            .map(|old| (old.clone(), Uuid::new_v4().to_string()))
            .collect();

        let mut nodes = BTreeMap::new();
        for (old_id, node) in &source.nodes {
            let mut copy = node.clone();
            copy.id = id_map[old_id].clone();
            copy.flow_id = new_flow_id.clone();
            copy.remap_targets(&id_map);
            nodes.insert(copy.id.clone(), copy);
        }

        let now = chrono::Utc::now();
        let duplicate = BotFlow {
            schema_version: FLOW_SCHEMA_VERSION,
            id: new_flow_id,
            name,
            description: source.description.clone(),
            status: FlowStatus::Draft,
            start_node_id: source
                .start_node_id
                .as_ref()
                .and_then(|s| id_map.get(s).cloned()),
            variables: source.variables.clone(),
            settings: source.settings.clone(),
            nodes,
            created_at: now,
            updated_at: now,
        };
        self.store.put_flow(&duplicate).await?;
        info!(source = flow_id, duplicate = %duplicate.id, "flow duplicated");
        Ok(duplicate)
    }

    // -- Node editing -------------------------------------------------------

    pub async fn create_node(
        &self,
        flow_id: &str,
        req: CreateNodeRequest,
    ) -> Result<BotNode, FlowError> {
        let created = self.create_nodes_bulk(flow_id, vec![req]).await?;
        Ok(created.into_iter().next().expect("bulk of one"))
    }

    /// Atomic bulk insert: either every node is created or none are.
    ///
    /// All configs are checked first; violations across the whole batch
    /// are aggregated into one `InvalidNodeConfig` so the editor can
    /// highlight every broken entry in one round trip.
    pub async fn create_nodes_bulk(
        &self,
        flow_id: &str,
        reqs: Vec<CreateNodeRequest>,
    ) -> Result<Vec<BotNode>, FlowError> {
        let lock = self.flow_lock(flow_id).await;
        let _guard = lock.lock().await;

        let mut flow = self.load(flow_id).await?;

        let mut errors = Vec::new();
        for req in &reqs {
            if let Err(errs) = validate_config(&req.name, &req.config) {
                errors.extend(errs);
            }
        }
        if !errors.is_empty() {
            return Err(FlowError::InvalidNodeConfig { errors });
        }

        let mut created = Vec::with_capacity(reqs.len());
        for req in reqs {
            let node = BotNode {
                id: Uuid::new_v4().to_string(),
                flow_id: flow_id.to_string(),
                name: req.name,
                config: req.config,
                next_node_id: req.next_node_id,
                position_x: req.position_x,
                position_y: req.position_y,
            };
            flow.nodes.insert(node.id.clone(), node.clone());
            created.push(node);
        }

        flow.touch();
        self.store.put_flow(&flow).await?;
        debug!(flow_id, count = created.len(), "nodes created");
        Ok(created)
    }

    pub async fn update_node(
        &self,
        flow_id: &str,
        node_id: &str,
        req: UpdateNodeRequest,
    ) -> Result<BotNode, FlowError> {
        let lock = self.flow_lock(flow_id).await;
        let _guard = lock.lock().await;

        let mut flow = self.load(flow_id).await?;
        let node = flow
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| FlowError::NodeNotFound {
                id: node_id.to_string(),
            })?;

        if let Some(name) = req.name {
            node.name = name;
        }
        if req.config.is_some() || req.kind.is_some() {
            let kind = req.kind.unwrap_or_else(|| node.kind());
            let config_value = match req.config {
                Some(v) => v,
                // Kind change without a config body: only valid when the
                // new kind needs no fields.
                None => serde_json::json!({}),
            };
            let tagged = serde_json::json!({
                "type": kind,
                "config": config_value,
            });
            let config: NodeConfig =
                serde_json::from_value(tagged).map_err(|e| FlowError::InvalidNodeConfig {
                    errors: vec![format!("node '{}': {e}", node.name)],
                })?;
            validate_config(&node.name, &config)
                .map_err(|errors| FlowError::InvalidNodeConfig { errors })?;
            node.config = config;
        }
        if let Some(next) = req.next_node_id {
            node.next_node_id = next;
        }
        if let Some(x) = req.position_x {
            node.position_x = x;
        }
        if let Some(y) = req.position_y {
            node.position_y = y;
        }

        let updated = node.clone();
        flow.touch();
        self.store.put_flow(&flow).await?;
        Ok(updated)
    }

    /// Remove a node. Inbound references are **not** repaired — relinking
    /// is the caller's job, and the next validation pass reports anything
    /// left dangling.
    pub async fn delete_node(&self, flow_id: &str, node_id: &str) -> Result<(), FlowError> {
        let lock = self.flow_lock(flow_id).await;
        let _guard = lock.lock().await;

        let mut flow = self.load(flow_id).await?;
        if flow.nodes.remove(node_id).is_none() {
            return Err(FlowError::NodeNotFound {
                id: node_id.to_string(),
            });
        }
        flow.touch();
        self.store.put_flow(&flow).await?;
        debug!(flow_id, node_id, "node deleted");
        Ok(())
    }

    /// Apply a batch of transition-target rewrites.
    ///
    /// Every edit is checked (node exists, slot exists, target is a node
    /// of this flow) before any is committed; the first invalid edit
    /// rejects the whole batch.
    pub async fn relink(&self, flow_id: &str, edits: Vec<RelinkEdit>) -> Result<BotFlow, FlowError> {
        let lock = self.flow_lock(flow_id).await;
        let _guard = lock.lock().await;

        let mut flow = self.load(flow_id).await?;

        for edit in &edits {
            if !flow.contains_node(&edit.target_node_id) {
                return Err(FlowError::DanglingReference {
                    node_id: edit.node_id.clone(),
                    target_id: edit.target_node_id.clone(),
                });
            }
            let node = flow
                .nodes
                .get_mut(&edit.node_id)
                .ok_or_else(|| FlowError::NodeNotFound {
                    id: edit.node_id.clone(),
                })?;
            apply_relink(node, edit)?;
        }

        flow.touch();
        self.store.put_flow(&flow).await?;
        debug!(flow_id, count = edits.len(), "transitions relinked");
        Ok(flow)
    }

    // -- Lifecycle ----------------------------------------------------------

    /// The `draft → active` gate. Fails with `FlowNotPublishable`, carrying
    /// every validation error, and leaves the status untouched.
    pub async fn publish(&self, flow_id: &str) -> Result<BotFlow, FlowError> {
        let lock = self.flow_lock(flow_id).await;
        let _guard = lock.lock().await;

        let mut flow = self.load(flow_id).await?;
        let report = validate_flow(&flow);
        if !report.is_valid() {
            return Err(FlowError::FlowNotPublishable {
                errors: report.errors,
            });
        }

        flow.status = FlowStatus::Active;
        flow.touch();
        self.store.put_flow(&flow).await?;
        info!(flow_id, warnings = report.warnings.len(), "flow published");
        Ok(flow)
    }

    /// Validate a flow without changing anything.
    pub async fn validate(&self, flow_id: &str) -> Result<ValidationReport, FlowError> {
        let flow = self.load(flow_id).await?;
        Ok(validate_flow(&flow))
    }

    /// Status transition rules. `draft → active` and `inactive → active`
    /// both re-run validation; `active → inactive` is free; everything
    /// else is rejected.
    fn transition(&self, flow: &mut BotFlow, to: FlowStatus) -> Result<(), FlowError> {
        let from = flow.status;
        if from == to {
            return Ok(());
        }
        match (from, to) {
            (FlowStatus::Draft, FlowStatus::Active)
            | (FlowStatus::Inactive, FlowStatus::Active) => {
                let report = validate_flow(flow);
                if !report.is_valid() {
                    return Err(FlowError::FlowNotPublishable {
                        errors: report.errors,
                    });
                }
                flow.status = FlowStatus::Active;
                Ok(())
            }
            (FlowStatus::Active, FlowStatus::Inactive) => {
                flow.status = FlowStatus::Inactive;
                Ok(())
            }
            _ => Err(FlowError::InvalidTransition { from, to }),
        }
    }
}

/// Write one relink edit into a node's transition slot.
fn apply_relink(node: &mut BotNode, edit: &RelinkEdit) -> Result<(), FlowError> {
    let target = Some(edit.target_node_id.clone());
    let name = node.name.clone();
    let kind = node.kind();
    let mismatch = move |slot: &str| FlowError::InvalidNodeConfig {
        errors: vec![format!("node '{name}' ({kind}) has no {slot} slot")],
    };

    match &edit.field {
        RelinkField::Next => {
            node.next_node_id = target;
            Ok(())
        }
        RelinkField::Else => match &mut node.config {
            NodeConfig::Condition(cfg) => {
                cfg.else_node_id = target;
                Ok(())
            }
            _ => Err(mismatch("elseNodeId")),
        },
        RelinkField::Condition { index } => match &mut node.config {
            NodeConfig::Condition(cfg) => match cfg.conditions.get_mut(*index) {
                Some(branch) => {
                    branch.next_node_id = target;
                    Ok(())
                }
                None => Err(FlowError::InvalidNodeConfig {
                    errors: vec![format!(
                        "node '{}' has no condition branch {index}",
                        node.name
                    )],
                }),
            },
            _ => Err(mismatch("conditions")),
        },
        RelinkField::Option { index } => match &mut node.config {
            NodeConfig::Menu(cfg) => match cfg.options.get_mut(*index) {
                Some(option) => {
                    option.next_node_id = target;
                    Ok(())
                }
                None => Err(FlowError::InvalidNodeConfig {
                    errors: vec![format!("node '{}' has no menu option {index}", node.name)],
                }),
            },
            _ => Err(mismatch("options")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::MemoryFlowStore;
    use crate::types::*;
    use serde_json::json;

    fn service() -> FlowService {
        FlowService::new(Arc::new(MemoryFlowStore::new()))
    }

    fn create_req(name: &str) -> CreateFlowRequest {
        CreateFlowRequest {
            name: name.into(),
            description: None,
            variables: BTreeMap::new(),
            settings: FlowSettings::default(),
        }
    }

    fn message_req(name: &str, text: &str) -> CreateNodeRequest {
        CreateNodeRequest {
            name: name.into(),
            config: NodeConfig::Message(MessageConfig {
                message: text.into(),
                use_buttons: false,
                button_title: None,
                buttons: vec![],
            }),
            next_node_id: None,
            position_x: 0,
            position_y: 0,
        }
    }

    fn end_req(name: &str) -> CreateNodeRequest {
        CreateNodeRequest {
            name: name.into(),
            config: NodeConfig::End(EndConfig {}),
            next_node_id: None,
            position_x: 0,
            position_y: 0,
        }
    }

    #[tokio::test]
    async fn create_flow_starts_as_draft() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        assert_eq!(flow.status, FlowStatus::Draft);
        assert!(flow.nodes.is_empty());
    }

    #[tokio::test]
    async fn duplicate_name_rejected() {
        let svc = service();
        svc.create_flow(create_req("Cobranza")).await.unwrap();
        let err = svc.create_flow(create_req("Cobranza")).await.unwrap_err();
        assert!(matches!(err, FlowError::DuplicateName { .. }));
    }

    #[tokio::test]
    async fn empty_name_rejected() {
        let svc = service();
        let err = svc.create_flow(create_req("   ")).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidName));
    }

    #[tokio::test]
    async fn bulk_create_is_all_or_nothing() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();

        // 5 valid nodes + 1 with an empty message.
        let mut reqs: Vec<CreateNodeRequest> = (0..5)
            .map(|i| message_req(&format!("msg-{i}"), "Hola"))
            .collect();
        reqs.push(message_req("roto", "  "));

        let err = svc.create_nodes_bulk(&flow.id, reqs).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidNodeConfig { .. }));

        let stored = svc.get_flow(&flow.id).await.unwrap();
        assert!(stored.nodes.is_empty(), "no partial commit");
    }

    #[tokio::test]
    async fn bulk_errors_are_aggregated() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();

        let reqs = vec![message_req("a", ""), message_req("b", " ")];
        let err = svc.create_nodes_bulk(&flow.id, reqs).await.unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("'a'"));
        assert!(errors[1].contains("'b'"));
    }

    #[tokio::test]
    async fn update_node_partial_fields() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let node = svc
            .create_node(&flow.id, message_req("Saludo", "Hola"))
            .await
            .unwrap();

        let updated = svc
            .update_node(
                &flow.id,
                &node.id,
                UpdateNodeRequest {
                    position_x: Some(120),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.position_x, 120);
        assert_eq!(updated.name, "Saludo");
    }

    #[tokio::test]
    async fn update_node_clears_next_with_explicit_null() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let target = svc.create_node(&flow.id, end_req("Fin")).await.unwrap();
        let mut req = message_req("Saludo", "Hola");
        req.next_node_id = Some(target.id.clone());
        let node = svc.create_node(&flow.id, req).await.unwrap();

        // Wire shape: {"nextNodeId": null} clears, absent leaves alone.
        let clear: UpdateNodeRequest = serde_json::from_value(json!({"nextNodeId": null})).unwrap();
        let updated = svc.update_node(&flow.id, &node.id, clear).await.unwrap();
        assert!(updated.next_node_id.is_none());

        let noop: UpdateNodeRequest = serde_json::from_value(json!({"name": "Saludo 2"})).unwrap();
        let updated = svc.update_node(&flow.id, &node.id, noop).await.unwrap();
        assert!(updated.next_node_id.is_none());
        assert_eq!(updated.name, "Saludo 2");
    }

    #[tokio::test]
    async fn update_node_replaces_config_keeping_kind() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let node = svc
            .create_node(&flow.id, message_req("Saludo", "Hola"))
            .await
            .unwrap();

        let req: UpdateNodeRequest =
            serde_json::from_value(json!({"config": {"message": "Buenas tardes"}})).unwrap();
        let updated = svc.update_node(&flow.id, &node.id, req).await.unwrap();
        match updated.config {
            NodeConfig::Message(cfg) => assert_eq!(cfg.message, "Buenas tardes"),
            other => panic!("kind changed: {:?}", other.kind()),
        }
    }

    #[tokio::test]
    async fn update_node_rejects_invalid_config() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let node = svc
            .create_node(&flow.id, message_req("Saludo", "Hola"))
            .await
            .unwrap();

        let req: UpdateNodeRequest =
            serde_json::from_value(json!({"config": {"message": ""}})).unwrap();
        let err = svc.update_node(&flow.id, &node.id, req).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidNodeConfig { .. }));
    }

    #[tokio::test]
    async fn delete_node_leaves_dangling_reference_for_validation() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let target = svc.create_node(&flow.id, end_req("Fin")).await.unwrap();
        let mut req = message_req("Saludo", "Hola");
        req.next_node_id = Some(target.id.clone());
        let source = svc.create_node(&flow.id, req).await.unwrap();
        svc.update_flow(
            &flow.id,
            UpdateFlowRequest {
                start_node_id: Some(Some(source.id.clone())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        svc.delete_node(&flow.id, &target.id).await.unwrap();

        // Not auto-healed; surfaces on the next validation pass.
        let report = svc.validate(&flow.id).await.unwrap();
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains(&format!("unknown target {}", target.id))));
    }

    #[tokio::test]
    async fn relink_rejects_whole_batch_on_first_bad_edit() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let a = svc.create_node(&flow.id, message_req("a", "Hola")).await.unwrap();
        let b = svc.create_node(&flow.id, end_req("b")).await.unwrap();

        let edits = vec![
            RelinkEdit {
                node_id: a.id.clone(),
                field: RelinkField::Next,
                target_node_id: b.id.clone(),
            },
            RelinkEdit {
                node_id: a.id.clone(),
                field: RelinkField::Next,
                target_node_id: "ghost".into(),
            },
        ];
        let err = svc.relink(&flow.id, edits).await.unwrap_err();
        assert!(matches!(err, FlowError::DanglingReference { .. }));

        // First edit must not have been applied.
        let stored = svc.get_flow(&flow.id).await.unwrap();
        assert!(stored.nodes[&a.id].next_node_id.is_none());
    }

    #[tokio::test]
    async fn relink_writes_condition_branches() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let cond = svc
            .create_node(
                &flow.id,
                CreateNodeRequest {
                    name: "Verificar".into(),
                    config: NodeConfig::Condition(ConditionConfig {
                        variable: "respuesta".into(),
                        conditions: vec![ConditionBranch {
                            variable: None,
                            operator: ConditionOperator::Equals,
                            value: json!("si"),
                            next_node_id: None,
                        }],
                        else_node_id: None,
                    }),
                    next_node_id: None,
                    position_x: 0,
                    position_y: 0,
                },
            )
            .await
            .unwrap();
        let yes = svc.create_node(&flow.id, end_req("Si")).await.unwrap();
        let no = svc.create_node(&flow.id, end_req("No")).await.unwrap();

        svc.relink(
            &flow.id,
            vec![
                RelinkEdit {
                    node_id: cond.id.clone(),
                    field: RelinkField::Condition { index: 0 },
                    target_node_id: yes.id.clone(),
                },
                RelinkEdit {
                    node_id: cond.id.clone(),
                    field: RelinkField::Else,
                    target_node_id: no.id.clone(),
                },
            ],
        )
        .await
        .unwrap();

        let stored = svc.get_flow(&flow.id).await.unwrap();
        let targets = stored.nodes[&cond.id].reference_targets();
        assert_eq!(targets, vec![yes.id.as_str(), no.id.as_str()]);
    }

    #[tokio::test]
    async fn relink_rejects_wrong_slot_kind() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let a = svc.create_node(&flow.id, message_req("a", "Hola")).await.unwrap();
        let b = svc.create_node(&flow.id, end_req("b")).await.unwrap();

        let err = svc
            .relink(
                &flow.id,
                vec![RelinkEdit {
                    node_id: a.id.clone(),
                    field: RelinkField::Else,
                    target_node_id: b.id,
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidNodeConfig { .. }));
    }

    #[tokio::test]
    async fn publish_gate_leaves_draft_on_failure() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let mut req = message_req("Saludo", "Hola");
        req.next_node_id = Some("ghost".into());
        let node = svc.create_node(&flow.id, req).await.unwrap();
        svc.update_flow(
            &flow.id,
            UpdateFlowRequest {
                start_node_id: Some(Some(node.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = svc.publish(&flow.id).await.unwrap_err();
        match err {
            FlowError::FlowNotPublishable { errors } => {
                assert!(errors.iter().any(|e| e.contains("ghost")));
            }
            other => panic!("unexpected: {other}"),
        }

        let stored = svc.get_flow(&flow.id).await.unwrap();
        assert_eq!(stored.status, FlowStatus::Draft);
    }

    #[tokio::test]
    async fn publish_without_start_node_fails() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        svc.create_node(&flow.id, end_req("Fin")).await.unwrap();

        let err = svc.publish(&flow.id).await.unwrap_err();
        assert!(err.to_string().contains("No start node defined"));
    }

    #[tokio::test]
    async fn lifecycle_toggles_and_reactivation_gate() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let node = svc.create_node(&flow.id, end_req("Fin")).await.unwrap();
        svc.update_flow(
            &flow.id,
            UpdateFlowRequest {
                start_node_id: Some(Some(node.id.clone())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        svc.publish(&flow.id).await.unwrap();

        // active -> inactive: free.
        let flow2 = svc
            .update_flow(
                &flow.id,
                UpdateFlowRequest {
                    status: Some(FlowStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(flow2.status, FlowStatus::Inactive);

        // Break the graph while inactive, then try to re-activate.
        svc.delete_node(&flow.id, &node.id).await.unwrap();
        let err = svc
            .update_flow(
                &flow.id,
                UpdateFlowRequest {
                    status: Some(FlowStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::FlowNotPublishable { .. }));
    }

    #[tokio::test]
    async fn active_to_draft_is_rejected() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let node = svc.create_node(&flow.id, end_req("Fin")).await.unwrap();
        svc.update_flow(
            &flow.id,
            UpdateFlowRequest {
                start_node_id: Some(Some(node.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        svc.publish(&flow.id).await.unwrap();

        let err = svc
            .update_flow(
                &flow.id,
                UpdateFlowRequest {
                    status: Some(FlowStatus::Draft),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::InvalidTransition {
                from: FlowStatus::Active,
                to: FlowStatus::Draft
            }
        ));
    }

    #[tokio::test]
    async fn duplicate_remaps_every_reference() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();

        let fin = svc.create_node(&flow.id, end_req("Fin")).await.unwrap();
        let cond = svc
            .create_node(
                &flow.id,
                CreateNodeRequest {
                    name: "Verificar".into(),
                    config: NodeConfig::Condition(ConditionConfig {
                        variable: "respuesta".into(),
                        conditions: vec![ConditionBranch {
                            variable: None,
                            operator: ConditionOperator::Equals,
                            value: json!("si"),
                            next_node_id: Some(fin.id.clone()),
                        }],
                        else_node_id: Some(fin.id.clone()),
                    }),
                    next_node_id: None,
                    position_x: 0,
                    position_y: 0,
                },
            )
            .await
            .unwrap();
        let mut saludo = message_req("Saludo", "Hola");
        saludo.next_node_id = Some(cond.id.clone());
        let saludo = svc.create_node(&flow.id, saludo).await.unwrap();
        svc.update_flow(
            &flow.id,
            UpdateFlowRequest {
                start_node_id: Some(Some(saludo.id.clone())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let copy = svc.duplicate_flow(&flow.id).await.unwrap();

        assert_eq!(copy.status, FlowStatus::Draft);
        assert_eq!(copy.nodes.len(), 3);
        assert_ne!(copy.id, flow.id);

        let original_ids: std::collections::HashSet<String> =
            [fin.id.clone(), cond.id.clone(), saludo.id.clone()]
                .into_iter()
                .collect();

        // Zero cross-flow references: every target resolves inside the
        // copy and never points back at the source flow.
        let start = copy.start_node_id.as_deref().unwrap();
        assert!(copy.contains_node(start));
        assert!(!original_ids.contains(start));
        for node in copy.nodes.values() {
            assert_eq!(node.flow_id, copy.id);
            assert!(!original_ids.contains(&node.id));
            for target in node.reference_targets() {
                assert!(copy.contains_node(target), "dangling {target}");
                assert!(!original_ids.contains(target));
            }
        }
    }

    #[tokio::test]
    async fn duplicate_names_are_deconflicted() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();

        let first = svc.duplicate_flow(&flow.id).await.unwrap();
        let second = svc.duplicate_flow(&flow.id).await.unwrap();
        assert_eq!(first.name, "Cobranza (copy)");
        assert_eq!(second.name, "Cobranza (copy 2)");
    }

    #[tokio::test]
    async fn duplicating_active_flow_yields_draft() {
        let svc = service();
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();
        let node = svc.create_node(&flow.id, end_req("Fin")).await.unwrap();
        svc.update_flow(
            &flow.id,
            UpdateFlowRequest {
                start_node_id: Some(Some(node.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        svc.publish(&flow.id).await.unwrap();

        let copy = svc.duplicate_flow(&flow.id).await.unwrap();
        assert_eq!(copy.status, FlowStatus::Draft);
    }

    #[tokio::test]
    async fn concurrent_bulk_creates_do_not_lose_nodes() {
        let svc = Arc::new(service());
        let flow = svc.create_flow(create_req("Cobranza")).await.unwrap();

        let mut handles = Vec::new();
        for t in 0..8u32 {
            let svc = svc.clone();
            let flow_id = flow.id.clone();
            handles.push(tokio::spawn(async move {
                let reqs: Vec<CreateNodeRequest> = (0..5)
                    .map(|i| message_req(&format!("t{t}-n{i}"), "Hola"))
                    .collect();
                svc.create_nodes_bulk(&flow_id, reqs).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let stored = svc.get_flow(&flow.id).await.unwrap();
        assert_eq!(stored.nodes.len(), 40, "per-flow lock must prevent lost updates");
    }

    /// The seeded NGSO collections flow: greeting, authorization check,
    /// document capture, debtor lookup, found/not-found branches, wait,
    /// agent transfer, and a rejection path to the end node.
    #[tokio::test]
    async fn ngso_collections_flow_publishes() {
        let svc = service();

        let mut variables = BTreeMap::new();
        for (name, var_type) in [
            ("autorizacion", VariableType::String),
            ("documento", VariableType::String),
            ("debtorFound", VariableType::Boolean),
            ("clientName", VariableType::String),
        ] {
            variables.insert(
                name.to_string(),
                FlowVariable {
                    name: name.to_string(),
                    var_type,
                    default_value: None,
                },
            );
        }
        let flow = svc
            .create_flow(CreateFlowRequest {
                name: "Cobranza NGSO".into(),
                description: Some("Flujo de cobranza con verificación de deudor".into()),
                variables,
                settings: FlowSettings::default(),
            })
            .await
            .unwrap();

        let reqs = vec![
            CreateNodeRequest {
                name: "Saludo".into(),
                config: NodeConfig::Message(MessageConfig {
                    message: "Hola, le escribimos de NGSO. ¿Autoriza el tratamiento de sus datos?"
                        .into(),
                    use_buttons: true,
                    button_title: Some("Seleccione una opción".into()),
                    buttons: vec![
                        MessageButton {
                            id: "aceptada".into(),
                            text: "Sí, autorizo".into(),
                        },
                        MessageButton {
                            id: "rechazada".into(),
                            text: "No autorizo".into(),
                        },
                    ],
                }),
                next_node_id: None,
                position_x: 0,
                position_y: 0,
            },
            CreateNodeRequest {
                name: "Verificar Autorización".into(),
                config: NodeConfig::Condition(ConditionConfig {
                    variable: "autorizacion".into(),
                    conditions: vec![ConditionBranch {
                        variable: None,
                        operator: ConditionOperator::Equals,
                        value: json!("aceptada"),
                        next_node_id: None,
                    }],
                    else_node_id: None,
                }),
                next_node_id: None,
                position_x: 200,
                position_y: 0,
            },
            CreateNodeRequest {
                name: "Solicitar Documento".into(),
                config: NodeConfig::Input(InputConfig {
                    message: "Por favor indique su número de documento".into(),
                    input_type: InputType::Document,
                    variable_name: "documento".into(),
                    validation: InputValidation {
                        required: true,
                        min_length: Some(6),
                        max_length: Some(12),
                        pattern: Some(r"^\d+$".into()),
                        error_message: Some("El documento debe ser numérico".into()),
                    },
                }),
                next_node_id: None,
                position_x: 400,
                position_y: 0,
            },
            CreateNodeRequest {
                name: "Consultar Deudor".into(),
                config: NodeConfig::ApiCall(ApiCallConfig {
                    url: "https://core.ngso.example/api/debtors/lookup".into(),
                    method: "POST".into(),
                    headers: Default::default(),
                    body: Some(json!({"documento": "{{documento}}"})),
                    response_mapping: [
                        ("found".to_string(), "debtorFound".to_string()),
                        ("name".to_string(), "clientName".to_string()),
                    ]
                    .into(),
                }),
                next_node_id: None,
                position_x: 600,
                position_y: 0,
            },
            CreateNodeRequest {
                name: "Verificar Deudor".into(),
                config: NodeConfig::Condition(ConditionConfig {
                    variable: "debtorFound".into(),
                    conditions: vec![ConditionBranch {
                        variable: None,
                        operator: ConditionOperator::Equals,
                        value: json!(true),
                        next_node_id: None,
                    }],
                    else_node_id: None,
                }),
                next_node_id: None,
                position_x: 800,
                position_y: 0,
            },
            message_req("Encontrado", "{{clientName}}, encontramos su obligación pendiente."),
            message_req(
                "No Encontrado",
                "No encontramos obligaciones asociadas a ese documento.",
            ),
            message_req("Espera", "Un momento por favor, lo comunicamos con un asesor."),
            CreateNodeRequest {
                name: "Transferir".into(),
                config: NodeConfig::TransferAgent(TransferConfig {
                    message: "Lo conectamos con un asesor de cobranza.".into(),
                    transfer_reason: "gestión de pago".into(),
                }),
                next_node_id: None,
                position_x: 1200,
                position_y: 0,
            },
            message_req("Rechazada", "Entendido, no continuaremos sin su autorización."),
            end_req("Fin"),
        ];
        let nodes = svc.create_nodes_bulk(&flow.id, reqs).await.unwrap();
        assert_eq!(nodes.len(), 11);

        let id_of = |name: &str| -> String {
            nodes
                .iter()
                .find(|n| n.name == name)
                .unwrap_or_else(|| panic!("node {name}"))
                .id
                .clone()
        };

        let edits = vec![
            RelinkEdit {
                node_id: id_of("Saludo"),
                field: RelinkField::Next,
                target_node_id: id_of("Verificar Autorización"),
            },
            RelinkEdit {
                node_id: id_of("Verificar Autorización"),
                field: RelinkField::Condition { index: 0 },
                target_node_id: id_of("Solicitar Documento"),
            },
            RelinkEdit {
                node_id: id_of("Verificar Autorización"),
                field: RelinkField::Else,
                target_node_id: id_of("Rechazada"),
            },
            RelinkEdit {
                node_id: id_of("Solicitar Documento"),
                field: RelinkField::Next,
                target_node_id: id_of("Consultar Deudor"),
            },
            RelinkEdit {
                node_id: id_of("Consultar Deudor"),
                field: RelinkField::Next,
                target_node_id: id_of("Verificar Deudor"),
            },
            RelinkEdit {
                node_id: id_of("Verificar Deudor"),
                field: RelinkField::Condition { index: 0 },
                target_node_id: id_of("Encontrado"),
            },
            RelinkEdit {
                node_id: id_of("Verificar Deudor"),
                field: RelinkField::Else,
                target_node_id: id_of("No Encontrado"),
            },
            RelinkEdit {
                node_id: id_of("Encontrado"),
                field: RelinkField::Next,
                target_node_id: id_of("Espera"),
            },
            RelinkEdit {
                node_id: id_of("No Encontrado"),
                field: RelinkField::Next,
                target_node_id: id_of("Espera"),
            },
            RelinkEdit {
                node_id: id_of("Espera"),
                field: RelinkField::Next,
                target_node_id: id_of("Transferir"),
            },
            RelinkEdit {
                node_id: id_of("Rechazada"),
                field: RelinkField::Next,
                target_node_id: id_of("Fin"),
            },
        ];
        svc.relink(&flow.id, edits).await.unwrap();

        svc.update_flow(
            &flow.id,
            UpdateFlowRequest {
                start_node_id: Some(Some(id_of("Saludo"))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let report = svc.validate(&flow.id).await.unwrap();
        assert!(report.is_valid(), "{:?}", report.errors);

        let published = svc.publish(&flow.id).await.unwrap();
        assert_eq!(published.status, FlowStatus::Active);
    }

    #[tokio::test]
    async fn cycles_survive_the_publish_gate() {
        let svc = service();
        let flow = svc.create_flow(create_req("Reintentos")).await.unwrap();
        let a = svc.create_node(&flow.id, message_req("a", "Hola")).await.unwrap();
        let b = svc.create_node(&flow.id, message_req("b", "¿Sigue ahí?")).await.unwrap();
        svc.relink(
            &flow.id,
            vec![
                RelinkEdit {
                    node_id: a.id.clone(),
                    field: RelinkField::Next,
                    target_node_id: b.id.clone(),
                },
                RelinkEdit {
                    node_id: b.id.clone(),
                    field: RelinkField::Next,
                    target_node_id: a.id.clone(),
                },
            ],
        )
        .await
        .unwrap();
        svc.update_flow(
            &flow.id,
            UpdateFlowRequest {
                start_node_id: Some(Some(a.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let published = svc.publish(&flow.id).await.unwrap();
        assert_eq!(published.status, FlowStatus::Active);
    }
}
