//! Persisted deployment status for the banner.
//!
//! The cache is advisory: a store that cannot be read or written behaves like
//! an empty one, and an entry older than the TTL is ignored.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::BANNER_STORAGE_KEY;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Key/value string storage, the shape of browser local storage.
pub trait StatusStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per entry under a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StatusStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

/// Serialized cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedStatus {
    pub deployed: bool,
    /// Epoch milliseconds at write time
    pub cached_at: i64,
}

/// TTL-aware view over a [`StatusStore`].
#[derive(Clone)]
pub struct StatusCache {
    store: Arc<dyn StatusStore>,
    ttl: Duration,
}

impl StatusCache {
    pub fn new(store: Arc<dyn StatusStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Read the cached status if present and not expired.
    pub fn read(&self) -> Option<CachedStatus> {
        self.read_at(Utc::now().timestamp_millis())
    }

    pub fn read_at(&self, now_ms: i64) -> Option<CachedStatus> {
        let raw = match self.store.get(BANNER_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(error = %e, "Banner cache read failed");
                return None;
            }
        };

        let cached: CachedStatus = serde_json::from_str(&raw).ok()?;
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        if now_ms.saturating_sub(cached.cached_at) > ttl_ms {
            return None;
        }
        Some(cached)
    }

    /// Record a status. Failures are logged and otherwise ignored.
    pub fn write(&self, deployed: bool) {
        self.write_at(deployed, Utc::now().timestamp_millis());
    }

    pub fn write_at(&self, deployed: bool, now_ms: i64) {
        let entry = CachedStatus {
            deployed,
            cached_at: now_ms,
        };
        let result = serde_json::to_string(&entry)
            .map_err(|e| StoreError::Unavailable(e.to_string()))
            .and_then(|raw| self.store.set(BANNER_STORAGE_KEY, &raw));
        if let Err(e) = result {
            tracing::debug!(error = %e, "Banner cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    struct BrokenStore;

    impl StatusStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("quota exceeded".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("quota exceeded".to_string()))
        }
    }

    fn memory_cache() -> (Arc<MemoryStore>, StatusCache) {
        let store = Arc::new(MemoryStore::new());
        let cache = StatusCache::new(store.clone(), Duration::from_secs(3600));
        (store, cache)
    }

    #[test]
    fn test_read_within_ttl() {
        let (_, cache) = memory_cache();
        let now = 1_700_000_000_000;
        cache.write_at(true, now);

        let cached = cache.read_at(now + HOUR_MS).unwrap();
        assert_eq!(
            cached,
            CachedStatus {
                deployed: true,
                cached_at: now
            }
        );
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let (_, cache) = memory_cache();
        let now = 1_700_000_000_000;
        cache.write_at(true, now);
        assert!(cache.read_at(now + HOUR_MS + 1).is_none());
    }

    #[test]
    fn test_negative_status_is_cached() {
        let (_, cache) = memory_cache();
        cache.write(false);
        assert_eq!(cache.read().map(|c| c.deployed), Some(false));
    }

    #[test]
    fn test_last_write_wins() {
        let (_, cache) = memory_cache();
        let now = 1_700_000_000_000;
        cache.write_at(false, now);
        cache.write_at(true, now + 10);
        assert_eq!(cache.read_at(now + 20).map(|c| c.deployed), Some(true));
    }

    #[test]
    fn test_serialized_shape() {
        let (store, cache) = memory_cache();
        cache.write_at(true, 42);
        let raw = store.get(BANNER_STORAGE_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json, serde_json::json!({"deployed": true, "cachedAt": 42}));
    }

    #[test]
    fn test_corrupt_entry_is_absent() {
        let (store, cache) = memory_cache();
        store.set(BANNER_STORAGE_KEY, "{not json").unwrap();
        assert!(cache.read().is_none());
    }

    #[test]
    fn test_broken_store_is_a_miss() {
        let cache = StatusCache::new(Arc::new(BrokenStore), Duration::from_secs(3600));
        cache.write(true);
        assert!(cache.read().is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state"));
        assert_eq!(store.get("missing").unwrap(), None);

        let cache = StatusCache::new(Arc::new(store.clone()), Duration::from_secs(3600));
        cache.write(true);
        assert!(dir.path().join("state/deploy-banner-status.json").exists());
        assert_eq!(cache.read().map(|c| c.deployed), Some(true));
    }
}
