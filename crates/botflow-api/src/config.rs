//! Server configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Runtime configuration for the API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address. `BOTFLOW_ADDR`, default `127.0.0.1:8080`.
    pub addr: SocketAddr,
    /// Flow storage directory. `BOTFLOW_DATA_DIR`; in-memory when unset.
    pub data_dir: Option<PathBuf>,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let addr = std::env::var("BOTFLOW_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid BOTFLOW_ADDR: {addr}"))?;
        let data_dir = std::env::var("BOTFLOW_DATA_DIR").ok().map(PathBuf::from);
        Ok(Self { addr, data_dir })
    }
}
