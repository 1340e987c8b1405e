//! Daemon configuration

use anyhow::{Context, Result};
use code_executor_core::ExecutorConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Configuration for the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address to bind
    pub host: IpAddr,

    /// TCP port
    pub port: u16,

    /// Largest accepted request body in bytes
    pub max_body_bytes: usize,

    /// Settings for every execution
    pub executor: ExecutorConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            max_body_bytes: 2 * 1024 * 1024,
            executor: ExecutorConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Defaults overridden by `CODE_EXECUTOR_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CODE_EXECUTOR_HOST") {
            config.host = host
                .parse()
                .with_context(|| format!("invalid CODE_EXECUTOR_HOST: {host}"))?;
        }
        if let Ok(port) = std::env::var("CODE_EXECUTOR_PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("invalid CODE_EXECUTOR_PORT: {port}"))?;
        }
        config
            .executor
            .apply_env()
            .context("invalid executor configuration")?;

        Ok(config)
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
