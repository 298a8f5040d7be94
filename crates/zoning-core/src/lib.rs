use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use zoning_providers::AdapterRegistry;

pub mod config;
pub mod demo;
pub mod orchestrator;
pub mod secrets;
pub mod state;
pub mod storage;

pub use config::CoreConfig;
pub use orchestrator::{SearchError, SearchOrchestrator, SearchOutcome};
pub use state::{AppStore, AppStoreBuilder, SearchHistoryEntry, SearchStatus};
pub use storage::{DiskStorage, MemoryStorage, Storage, StorageError};

/// Wires storage, adapters and the orchestrator into a loaded [`AppStore`].
pub async fn bootstrap(config: CoreConfig) -> Result<Arc<AppStore>> {
    let storage: Arc<dyn Storage> = if config.ephemeral {
        debug!(target: "zoning_core", "using in-memory storage");
        Arc::new(MemoryStorage::new())
    } else {
        let dir = config.resolved_storage_dir()?;
        debug!(target: "zoning_core", storage_dir = %dir.display(), "using disk storage");
        Arc::new(DiskStorage::new(dir))
    };

    let registry = AdapterRegistry::with_defaults(&config.adapters)
        .context("failed to initialize provider adapters")?;
    let orchestrator =
        SearchOrchestrator::new(registry, config.mode).with_timeout(config.adapter_timeout);

    info!(
        target: "zoning_core",
        storage_dir = ?config.storage_dir,
        ephemeral = config.ephemeral,
        boot_timestamp = %config.boot_timestamp,
        mode = %config.mode,
        timeout_secs = ?config.adapter_timeout.map(|t| t.as_secs()),
        "Core store starting"
    );

    let store = AppStore::builder(storage, orchestrator)
        .env_secrets(config.env_prefix.clone())
        .load()
        .await;
    Ok(Arc::new(store))
}
