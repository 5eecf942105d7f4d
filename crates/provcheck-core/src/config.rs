use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::hasher::DEFAULT_CHUNK_SIZE;

/// Extra HTTP settings (optional `[http]` section in config.toml).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent override; the built-in `provcheck/<version>` is used when absent.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Headers sent with every request (e.g. `Authorization`).
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Global configuration loaded from `~/.config/provcheck/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvcheckConfig {
    /// Base URL of the file server that serves manifests.
    pub server_url: String,
    /// Chunk size for streaming hashes.
    pub chunk_size_bytes: usize,
    /// Connect timeout for manifest requests (0 = built-in default).
    pub connect_timeout_secs: u64,
    /// Whole-request timeout for manifest requests (0 = built-in default).
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub http: Option<HttpConfig>,
}

impl Default for ProvcheckConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            connect_timeout_secs: 15,
            request_timeout_secs: 30,
            http: None,
        }
    }
}

impl ProvcheckConfig {
    fn validate(&self) -> Result<()> {
        if self.chunk_size_bytes == 0 {
            anyhow::bail!("chunk_size_bytes must be greater than 0");
        }
        url::Url::parse(&self.server_url)
            .with_context(|| format!("invalid server_url {:?}", self.server_url))?;
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("provcheck")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ProvcheckConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ProvcheckConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load and validate configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<ProvcheckConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: ProvcheckConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
