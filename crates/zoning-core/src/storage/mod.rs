//! Durable key/value storage for application state.
//!
//! Values are JSON documents stored under fixed keys. Reading a missing or
//! unreadable key falls back to a default rather than failing.

pub mod disk;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::warn;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("storage i/o failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode value for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
}

/// Loads the JSON value at `key`, or `default()` when it is absent or unreadable.
pub async fn load_or_default<T, F>(storage: &dyn Storage, key: &str, default: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let raw = match storage.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return default(),
        Err(error) => {
            warn!(target: "zoning_core", key, error = %error, "failed to read stored value");
            return default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(error) => {
            warn!(
                target: "zoning_core",
                key,
                error = %error,
                "stored value is not valid JSON for its type; using defaults"
            );
            default()
        }
    }
}

pub async fn save_json<T>(storage: &dyn Storage, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    storage.set(key, payload).await
}

pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
