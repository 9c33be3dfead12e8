//! In-memory flow store for testing and lightweight usage.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::FlowStoreError;
use crate::traits::{FlowFilter, FlowPage, FlowStore};
use crate::types::{BotFlow, FlowSummary};

/// In-memory implementation of [`FlowStore`].
///
/// Uses `BTreeMap` for deterministic iteration order. Suitable for tests
/// and short-lived processes.
pub struct MemoryFlowStore {
    flows: Arc<RwLock<BTreeMap<String, BotFlow>>>,
}

impl MemoryFlowStore {
    pub fn new() -> Self {
        Self {
            flows: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl Default for MemoryFlowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowStore for MemoryFlowStore {
    async fn put_flow(&self, flow: &BotFlow) -> Result<(), FlowStoreError> {
        let mut flows = self.flows.write().await;
        flows.insert(flow.id.clone(), flow.clone());
        Ok(())
    }

    async fn get_flow(&self, flow_id: &str) -> Result<Option<BotFlow>, FlowStoreError> {
        let flows = self.flows.read().await;
        Ok(flows.get(flow_id).cloned())
    }

    async fn list_flows(&self, filter: &FlowFilter) -> Result<FlowPage, FlowStoreError> {
        let flows = self.flows.read().await;
        let mut matching: Vec<FlowSummary> = flows
            .values()
            .filter(|f| filter.status.map_or(true, |s| f.status == s))
            .map(FlowSummary::from)
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));

        let total = matching.len();
        let (page, limit) = filter.page_bounds();
        let flows = matching
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();

        Ok(FlowPage {
            flows,
            total,
            page,
            limit,
        })
    }

    async fn delete_flow(&self, flow_id: &str) -> Result<bool, FlowStoreError> {
        let mut flows = self.flows.write().await;
        Ok(flows.remove(flow_id).is_some())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<BotFlow>, FlowStoreError> {
        let flows = self.flows.read().await;
        Ok(flows.values().find(|f| f.name == name).cloned())
    }
}
