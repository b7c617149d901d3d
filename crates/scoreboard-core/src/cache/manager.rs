use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::store::{NamespacedStore, Storage, StorageError};

/// Reserved namespace for API response caching. Physical keys start with `cache_`.
pub const CACHE_NAMESPACE: &str = "cache";

/// Logical resources the data-access layer caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Teams,
    Rating,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Teams => "teams",
            CacheKey::Rating => "rating",
        }
    }
}

/// TTL cache over client storage.
#[derive(Debug, Clone)]
pub struct CacheManager {
    store: NamespacedStore,
}

impl CacheManager {
    pub fn new(storage: Storage) -> Self {
        Self {
            store: NamespacedStore::new(storage),
        }
    }

    pub fn get_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_cached_at(key, Utc::now())
    }

    /// Cached payload if still valid at `now`; a stale entry is evicted.
    pub fn get_cached_at<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let hit = self.store.get_at(CACHE_NAMESPACE, key, now);
        debug!(key, hit = hit.is_some(), "Cache lookup");
        hit
    }

    pub fn set_cached<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        duration: Duration,
    ) -> Result<(), StorageError> {
        self.set_cached_at(key, data, duration, Utc::now())
    }

    /// Store `data` until `now + duration`, replacing any previous entry.
    pub fn set_cached_at<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.store.set_at(CACHE_NAMESPACE, key, data, Some(duration), now)
    }

    pub fn invalidate(&self, key: &str) -> Result<(), StorageError> {
        self.store.remove(CACHE_NAMESPACE, key)
    }

    /// Evict every cache entry; other stored keys are preserved.
    pub fn clear_cache(&self) -> Result<usize, StorageError> {
        let removed = self.store.clear(CACHE_NAMESPACE)?;
        debug!(removed, "Cache cleared");
        Ok(removed)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    #[test]
    fn test_cache_hit_before_expiry_miss_after() {
        let cache = CacheManager::new(Storage::in_memory());
        let now = Utc::now();
        let payload = json!({"success": true, "teams": [{"id": 1}]});

        cache
            .set_cached_at("teams", &payload, Duration::from_secs(30), now)
            .unwrap();

        for offset_ms in [0, 1, 15_000, 29_999] {
            let hit: Option<serde_json::Value> =
                cache.get_cached_at("teams", now + ChronoDuration::milliseconds(offset_ms));
            assert_eq!(hit.as_ref(), Some(&payload), "expected hit at +{}ms", offset_ms);
        }

        let miss: Option<serde_json::Value> =
            cache.get_cached_at("teams", now + ChronoDuration::milliseconds(30_000));
        assert!(miss.is_none());
    }

    #[test]
    fn test_set_cached_overwrites() {
        let cache = CacheManager::new(Storage::in_memory());
        let now = Utc::now();
        cache.set_cached_at("rating", &1, Duration::from_secs(5), now).unwrap();
        cache.set_cached_at("rating", &2, Duration::from_millis(10), now).unwrap();

        assert_eq!(cache.get_cached_at::<i32>("rating", now), Some(2));
        // Expiry comes from the latest write
        assert_eq!(
            cache.get_cached_at::<i32>("rating", now + ChronoDuration::milliseconds(10)),
            None
        );
    }

    #[test]
    fn test_invalidate() {
        let cache = CacheManager::new(Storage::in_memory());
        cache.set_cached("teams", &"x", Duration::from_secs(30)).unwrap();
        cache.invalidate(CacheKey::Teams.as_str()).unwrap();
        assert_eq!(cache.get_cached::<String>("teams"), None);
    }

    #[test]
    fn test_clear_cache_preserves_unrelated_keys() {
        let storage = Storage::in_memory();
        storage.set_item("session_token", "abc").unwrap();
        storage.set_item("prefs_theme", "{\"data\":\"dark\"}").unwrap();
        storage.set_item("playerName", "Аня").unwrap();

        let cache = CacheManager::new(storage.clone());
        cache.set_cached("teams", &1, Duration::from_secs(30)).unwrap();
        cache.set_cached("rating", &2, Duration::from_secs(5)).unwrap();

        assert_eq!(cache.clear_cache().unwrap(), 2);
        assert_eq!(cache.get_cached::<i32>("teams"), None);
        assert_eq!(cache.get_cached::<i32>("rating"), None);

        let mut keys = storage.keys();
        keys.sort();
        assert_eq!(keys, vec!["playerName", "prefs_theme", "session_token"]);
    }

    #[test]
    fn test_cache_key_names() {
        assert_eq!(CacheKey::Teams.as_str(), "teams");
        assert_eq!(CacheKey::Rating.as_str(), "rating");
    }
}
