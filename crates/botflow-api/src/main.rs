use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use botflow_api::{router, ApiConfig, AppState};
use botflow_engine::{FileFlowStore, FlowService, FlowStore, MemoryFlowStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ApiConfig::from_env()?;

    let store: Arc<dyn FlowStore> = match &config.data_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "using file-backed flow store");
            Arc::new(FileFlowStore::new(dir.clone())?)
        }
        None => {
            info!("no BOTFLOW_DATA_DIR set, using in-memory flow store");
            Arc::new(MemoryFlowStore::new())
        }
    };
    let service = Arc::new(FlowService::new(store));
    let app = router(AppState { service });

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "botflow api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
