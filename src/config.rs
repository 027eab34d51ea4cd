use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::Status;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store file; the XDG data directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,

    /// How often the dashboard checks the store for outside writes.
    pub poll_interval_ms: u64,

    pub user_agent: String,

    pub fetch_timeout_secs: u64,

    /// Status used when the capture prompt is left empty.
    pub default_status: Status,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            poll_interval_ms: 500,
            user_agent: format!("jobsync/{}", env!("CARGO_PKG_VERSION")),
            fetch_timeout_secs: 20,
            default_status: Status::Applied,
        }
    }
}

impl Config {
    /// Read the config file, writing one with defaults on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config: {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            if let Err(e) = config.save_to(path) {
                tracing::warn!(error = %e, path = %path.display(), "could not write default config");
            }
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "jobsync")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("jobsync.toml"))
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(Store::default_path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(50))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
