//! TTL read cache for shard files.
//!
//! A small map + single mutex is sufficient (`SPEC_FULL.md` §9 REDESIGN
//! note) — this is not an LRU, just an expiring memoization of "the last
//! array we parsed from this path". Writes invalidate their own path
//! explicitly; any other staleness is bounded by the TTL.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct Entry {
    value: Arc<Value>,
    expires_at: Instant,
}

/// Caches parsed JSON arrays by file path for [`DEFAULT_TTL`].
#[derive(Clone)]
pub struct ShardCache {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<PathBuf, Entry>>>,
}

impl Default for ShardCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ShardCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns a cached array for `path` if present and not yet expired.
    /// Performs an opportunistic GC sweep of expired entries on each access.
    pub fn get(&self, path: &Path) -> Option<Arc<Value>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.get(path).map(|entry| entry.value.clone())
    }

    /// Stores `value` (expected to be a JSON array) for `path`, valid for
    /// one TTL window from now.
    pub fn put(&self, path: &Path, value: Arc<Value>) {
        let mut entries = self.entries.lock();
        entries.insert(
            path.to_path_buf(),
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drops the cached entry for `path`, forcing the next read to reload
    /// from disk. Called after every successful write.
    pub fn invalidate(&self, path: &Path) {
        self.entries.lock().remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_expire_after_ttl() {
        let cache = ShardCache::new(Duration::from_millis(10));
        let path = PathBuf::from("/tmp/shard-cache-test.json");
        cache.put(&path, Arc::new(json!([1, 2, 3])));
        assert!(cache.get(&path).is_some());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&path).is_none());
    }

    #[test]
    fn invalidate_drops_immediately() {
        let cache = ShardCache::new(Duration::from_secs(60));
        let path = PathBuf::from("/tmp/shard-cache-test-2.json");
        cache.put(&path, Arc::new(json!([1])));
        cache.invalidate(&path);
        assert!(cache.get(&path).is_none());
    }
}
