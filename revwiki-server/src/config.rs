use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use revwiki_core::{Config, StorageKind};
use tracing::info;

use crate::cli::{Cli, DEFAULT_CONFIG};

/// Runtime configuration: the YAML file overlaid with CLI/env values.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub max_body_bytes: usize,
    pub storage: StorageKind,
    pub data_dir: PathBuf,
    pub cache_capacity: Option<usize>,
    pub base_url: String,
}

impl ServerConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let file = if cli.config.exists() {
            Config::from_file(&cli.config)
                .with_context(|| format!("loading {}", cli.config.display()))?
        } else if cli.config == PathBuf::from(DEFAULT_CONFIG) {
            info!(path = %cli.config.display(), "no config file, using defaults");
            Config::default()
        } else {
            anyhow::bail!("config file not found: {}", cli.config.display());
        };

        let mut config = Self::from_file_config(&file);
        if let Some(addr) = cli.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(dir) = &cli.data_dir {
            config.storage = StorageKind::File;
            config.data_dir = dir.clone();
        }
        Ok(config)
    }

    pub fn from_file_config(file: &Config) -> Self {
        Self {
            listen_addr: file.server.listen_addr,
            max_body_bytes: file.server.max_body_bytes,
            storage: file.storage.backend,
            data_dir: file.data_dir(),
            cache_capacity: file.render.cache_capacity,
            base_url: file.render.base_url.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_file_config(&Config::default())
    }
}
