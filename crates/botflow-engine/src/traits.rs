//! Persistence trait for flow documents.
//!
//! Flows persist as whole documents (flow + owned nodes), so readers
//! always see a consistent snapshot — a half-applied bulk insert is never
//! observable. Default implementations live in `defaults/`.

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::FlowStoreError;
use crate::types::{BotFlow, FlowStatus, FlowSummary};

/// Durable storage and identity for [`BotFlow`] documents.
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Insert or replace a flow document.
    async fn put_flow(&self, flow: &BotFlow) -> Result<(), FlowStoreError>;

    async fn get_flow(&self, flow_id: &str) -> Result<Option<BotFlow>, FlowStoreError>;

    /// List flow summaries, filtered and paginated, ordered by name.
    async fn list_flows(&self, filter: &FlowFilter) -> Result<FlowPage, FlowStoreError>;

    /// Delete a flow and, by document composition, all its nodes.
    /// Returns `true` if the flow existed.
    async fn delete_flow(&self, flow_id: &str) -> Result<bool, FlowStoreError>;

    /// Look a flow up by its (unique) name.
    async fn find_by_name(&self, name: &str) -> Result<Option<BotFlow>, FlowStoreError>;
}

/// Filter criteria for listing flows.
#[derive(Debug, Clone, Default)]
pub struct FlowFilter {
    pub status: Option<FlowStatus>,
    /// 1-based page number. Default: 1.
    pub page: Option<usize>,
    /// Page size. Default: 20.
    pub limit: Option<usize>,
}

impl FlowFilter {
    pub(crate) fn page_bounds(&self) -> (usize, usize) {
        let limit = self.limit.unwrap_or(20).max(1);
        let page = self.page.unwrap_or(1).max(1);
        (page, limit)
    }
}

/// Paginated flow listing result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPage {
    pub flows: Vec<FlowSummary>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}
