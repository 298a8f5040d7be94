use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{validate_key, Storage, StorageError};

/// Stores each key as `<root>/<key>.json`.
#[derive(Debug)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

fn io_error(key: &str, source: std::io::Error) -> StorageError {
    StorageError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl Storage for DiskStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(None),
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(io_error(key, error)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        validate_key(key)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|error| io_error(key, error))?;

        // Write beside the target and rename so readers never see a partial file.
        let path = self.path_for(key);
        let staging = self.root.join(format!("{key}.json.tmp"));
        fs::write(&staging, value)
            .await
            .map_err(|error| io_error(key, error))?;
        restrict_permissions(&staging)
            .await
            .map_err(|error| io_error(key, error))?;
        fs::rename(&staging, &path)
            .await
            .map_err(|error| io_error(key, error))?;

        debug!(target: "zoning_core", file = ?path, "wrote stored value");
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trip_persists_value() {
        let dir = tempdir().expect("tempdir");
        let storage = DiskStorage::new(dir.path().join("nested"));

        storage
            .set("searchHistory", "[]".to_string())
            .await
            .expect("set");
        assert_eq!(
            storage.get("searchHistory").await.expect("get").as_deref(),
            Some("[]")
        );
        assert!(storage.path_for("searchHistory").exists());
        assert!(!dir.path().join("nested/searchHistory.json.tmp").exists());
    }

    #[tokio::test]
    async fn absent_file_reads_as_none() {
        let dir = tempdir().expect("tempdir");
        let storage = DiskStorage::new(dir.path());
        assert_eq!(storage.get("aiProviders").await.expect("get"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("tempdir");
        let storage = DiskStorage::new(dir.path());
        storage
            .set("aiProviders", "[]".to_string())
            .await
            .expect("set");
        let mode = std::fs::metadata(storage.path_for("aiProviders"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
