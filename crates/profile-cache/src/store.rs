//! Local persistence of the normalized snapshot.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;
use tracing::warn;

use crate::errors::ProfileResult;
use crate::model::UserProfileSnapshot;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Last persisted snapshot, regardless of age.
    async fn load(&self) -> ProfileResult<Option<UserProfileSnapshot>>;

    async fn save(&self, snapshot: &UserProfileSnapshot) -> ProfileResult<()>;

    async fn clear(&self) -> ProfileResult<()>;
}

/// JSON file on disk, written atomically through a sibling temp file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProfileStore for FileStore {
    async fn load(&self) -> ProfileResult<Option<UserProfileSnapshot>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "discarding unreadable profile snapshot");
                Ok(None)
            }
        }
    }

    async fn save(&self, snapshot: &UserProfileSnapshot) -> ProfileResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &data).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> ProfileResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<UserProfileSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load(&self) -> ProfileResult<Option<UserProfileSnapshot>> {
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, snapshot: &UserProfileSnapshot) -> ProfileResult<()> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> ProfileResult<()> {
        self.slot.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn file_store_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("profile.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let snapshot =
            UserProfileSnapshot::from_raw(&json!({"email": "ada@example.com"}), Utc::now()).unwrap();
        store.save(&snapshot).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(snapshot));
        assert!(!store.path().with_extension("tmp").exists());

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert_eq!(FileStore::new(path).load().await.unwrap(), None);
    }
}
