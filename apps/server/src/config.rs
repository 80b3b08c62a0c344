//! Server configuration, read from `FIELDSYNC_*` environment variables.

use std::net::SocketAddr;

use anyhow::{anyhow, Context};
use fieldsync_core::sync::SyncConfig;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_DB_DIR: &str = "./data";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_dir: String,
    pub api_url: String,
    pub access_token: Option<String>,
    pub company_id: Option<String>,
    pub listen_addr: SocketAddr,
    pub start_online: bool,
    pub sync: SyncConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = read("FIELDSYNC_API_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .ok_or_else(|| anyhow!("FIELDSYNC_API_URL must be set"))?;
        let listen_addr = read("FIELDSYNC_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid FIELDSYNC_LISTEN_ADDR '{}'", listen_addr))?;
        let start_online = match read("FIELDSYNC_START_ONLINE").as_deref() {
            None => true,
            Some(v) => !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"),
        };

        Ok(Self {
            db_dir: read("FIELDSYNC_DB_DIR").unwrap_or_else(|| DEFAULT_DB_DIR.to_string()),
            api_url,
            access_token: read("FIELDSYNC_ACCESS_TOKEN"),
            company_id: read("FIELDSYNC_COMPANY_ID"),
            listen_addr,
            start_online,
            sync: SyncConfig::from_lookup(&lookup),
        })
    }
}
