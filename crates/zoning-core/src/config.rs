use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use time::OffsetDateTime;
use zoning_providers::{types::SearchMode, AdapterSettings};

use crate::secrets::DEFAULT_ENV_PREFIX;

/// Inputs required to bootstrap the application store.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Where provider and history documents are written; the platform data dir when unset.
    pub storage_dir: Option<PathBuf>,
    /// Keep state in memory only.
    pub ephemeral: bool,
    pub mode: SearchMode,
    /// Upper bound on a single provider call; `None` waits indefinitely.
    pub adapter_timeout: Option<Duration>,
    /// Prefix of the `<PREFIX>_<PROVIDER>_API_KEY` variables read at startup.
    pub env_prefix: String,
    pub adapters: AdapterSettings,
    /// Timestamp captured during process initialization for diagnostics.
    pub boot_timestamp: OffsetDateTime,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            ephemeral: false,
            mode: SearchMode::Multi,
            adapter_timeout: Some(Duration::from_secs(60)),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            adapters: AdapterSettings::default(),
            boot_timestamp: OffsetDateTime::now_utc(),
        }
    }
}

impl CoreConfig {
    /// Storage directory after applying the platform default.
    pub fn resolved_storage_dir(&self) -> Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_storage_dir(),
        }
    }
}

pub fn default_storage_dir() -> Result<PathBuf> {
    ProjectDirs::from("com", "ZoningFinder", "zoning-finder")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("unable to resolve a data directory for zoning-finder"))
}
