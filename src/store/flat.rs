//! Generic flat-file JSON CRUD helper.
//!
//! Settings, categories and query logs all share the identical "load array
//! (or single object), mutate, atomic write-back" shape as the shard store's
//! document list (`SPEC_FULL.md` §3, "Settings / Categories / Query logs").
//! This is an addition beyond the distilled spec's explicit contracts, since
//! the shard store's own file layout names these three files without
//! describing their access pattern — grounded on the same temp+rename
//! pattern `wg-ragsmith::ingestion::resume::ResumeTracker` uses for its own
//! single-file JSON state.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use crate::error::RagError;

use super::atomic_write_json;
use super::lock::PathLockMap;

/// A single JSON-object-backed flat file (e.g. `settings.json`).
#[derive(Clone)]
pub struct FlatStore<T> {
    path: PathBuf,
    locks: PathLockMap,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned + Default + Clone + Send> FlatStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            locks: PathLockMap::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Reads the current value, or `T::default()` if the file is absent or
    /// malformed.
    pub async fn read(&self) -> T {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(path = %self.path.display(), error = %err, "malformed flat-store JSON, using default");
                T::default()
            }),
            Err(_) => T::default(),
        }
    }

    /// Replaces the stored value atomically.
    pub async fn write(&self, value: &T) -> Result<(), RagError> {
        let _guard = self.locks.lock(&self.path).await;
        atomic_write_json(&self.path, value).await
    }

    /// Reads, applies `f`, writes back, and returns the updated value — all
    /// under the path's serial write lock so concurrent updaters don't race.
    pub async fn update(&self, f: impl FnOnce(&mut T) + Send) -> Result<T, RagError> {
        let _guard = self.locks.lock(&self.path).await;
        let mut value: T = match fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => T::default(),
        };
        f(&mut value);
        atomic_write_json(&self.path, &value).await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
    struct Settings {
        theme: String,
        count: u32,
    }

    #[tokio::test]
    async fn missing_file_reads_as_default() {
        let dir = tempdir().unwrap();
        let store: FlatStore<Settings> = FlatStore::new(dir.path().join("settings.json"));
        assert_eq!(store.read().await, Settings::default());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store: FlatStore<Settings> = FlatStore::new(dir.path().join("settings.json"));
        store
            .write(&Settings { theme: "dark".into(), count: 3 })
            .await
            .unwrap();
        assert_eq!(store.read().await, Settings { theme: "dark".into(), count: 3 });
    }

    #[tokio::test]
    async fn update_applies_patch_under_lock() {
        let dir = tempdir().unwrap();
        let store: FlatStore<Settings> = FlatStore::new(dir.path().join("settings.json"));
        store.update(|s| s.count += 1).await.unwrap();
        store.update(|s| s.count += 1).await.unwrap();
        assert_eq!(store.read().await.count, 2);
    }
}
