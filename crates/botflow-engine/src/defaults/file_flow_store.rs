//! File-system backed flow store.
//!
//! Layout:
//! ```text
//! {base_dir}/flows/{flow_id}.json — BotFlow (with its nodes)
//! ```

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::FlowStoreError;
use crate::traits::{FlowFilter, FlowPage, FlowStore};
use crate::types::{BotFlow, FlowSummary};

/// File-system backed store for flow documents.
///
/// Atomic writes use a temp-file-then-rename pattern to prevent partial
/// writes from corrupting the store.
pub struct FileFlowStore {
    flows_dir: PathBuf,
}

impl FileFlowStore {
    /// Create a new `FileFlowStore` rooted at `base_dir`.
    ///
    /// Creates `{base_dir}/flows/` if it doesn't exist.
    pub fn new(base_dir: PathBuf) -> Result<Self, FlowStoreError> {
        let flows_dir = base_dir.join("flows");
        std::fs::create_dir_all(&flows_dir).map_err(|e| FlowStoreError::Store {
            message: format!("failed to create flows directory: {e}"),
        })?;
        Ok(Self { flows_dir })
    }

    fn flow_path(&self, flow_id: &str) -> PathBuf {
        self.flows_dir.join(format!("{flow_id}.json"))
    }

    fn read_all(&self) -> Result<Vec<BotFlow>, FlowStoreError> {
        let entries = std::fs::read_dir(&self.flows_dir).map_err(|e| FlowStoreError::Store {
            message: format!("failed to read flows directory: {e}"),
        })?;

        let mut flows = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FlowStoreError::Store {
                message: format!("failed to read dir entry: {e}"),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = std::fs::read(&path).map_err(|e| FlowStoreError::Store {
                message: format!("failed to read flow file: {e}"),
            })?;
            if let Ok(flow) = serde_json::from_slice::<BotFlow>(&data) {
                flows.push(flow);
            }
        }
        Ok(flows)
    }
}

/// Atomic write: serialize to temp file, then rename over the target.
fn atomic_write(path: &std::path::Path, data: &[u8]) -> Result<(), FlowStoreError> {
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, data).map_err(|e| FlowStoreError::Store {
        message: format!("failed to write temp file: {e}"),
    })?;
    std::fs::rename(&temp_path, path).map_err(|e| FlowStoreError::Store {
        message: format!("failed to rename temp file: {e}"),
    })?;
    Ok(())
}

#[async_trait]
impl FlowStore for FileFlowStore {
    async fn put_flow(&self, flow: &BotFlow) -> Result<(), FlowStoreError> {
        let data = serde_json::to_vec_pretty(flow).map_err(|e| FlowStoreError::Store {
            message: format!("failed to serialize flow: {e}"),
        })?;
        atomic_write(&self.flow_path(&flow.id), &data)
    }

    async fn get_flow(&self, flow_id: &str) -> Result<Option<BotFlow>, FlowStoreError> {
        let path = self.flow_path(flow_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(&path).map_err(|e| FlowStoreError::Store {
            message: format!("failed to read flow: {e}"),
        })?;
        let flow = serde_json::from_slice(&data).map_err(|e| FlowStoreError::Store {
            message: format!("failed to deserialize flow: {e}"),
        })?;
        Ok(Some(flow))
    }

    async fn list_flows(&self, filter: &FlowFilter) -> Result<FlowPage, FlowStoreError> {
        let mut matching: Vec<FlowSummary> = self
            .read_all()?
            .iter()
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
        let path = self.flow_path(flow_id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| FlowStoreError::Store {
            message: format!("failed to delete flow: {e}"),
        })?;
        Ok(true)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<BotFlow>, FlowStoreError> {
        Ok(self.read_all()?.into_iter().find(|f| f.name == name))
    }
}
