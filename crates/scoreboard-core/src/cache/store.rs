use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound for a single entry's TTL (about ten years).
const MAX_TTL_MS: i64 = 10 * 365 * 24 * 60 * 60 * 1000;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize stored value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// String-keyed key-value store shared by the session, preferences and cache.
///
/// Clones share the same map. When opened on a file, every write rewrites
/// the whole file.
#[derive(Debug, Clone, Default)]
pub struct Storage {
    items: Arc<Mutex<BTreeMap<String, String>>>,
    path: Option<PathBuf>,
}

impl Storage {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open file-backed storage. A missing file starts empty; an unreadable
    /// or corrupt one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let items = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(items) => items,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Storage file is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        debug!(path = %path.display(), entries = items.len(), "Storage opened");
        Ok(Self {
            items: Arc::new(Mutex::new(items)),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(ref path) = self.path {
            let contents = serde_json::to_string_pretty(items)?;
            std::fs::write(path, contents).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn set_item(&self, key: &str, value: impl Into<String>) -> Result<(), StorageError> {
        let mut items = self.lock();
        items.insert(key.to_string(), value.into());
        self.persist(&items)
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.lock();
        if items.remove(key).is_some() {
            self.persist(&items)?;
        }
        Ok(())
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Remove every key starting with `prefix`, returning how many were removed.
    pub fn remove_prefixed(&self, prefix: &str) -> Result<usize, StorageError> {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|key, _| !key.starts_with(prefix));
        let removed = before - items.len();
        if removed > 0 {
            self.persist(&items)?;
        }
        Ok(removed)
    }
}

/// Stored form of a namespaced value: `{"data": ..., "expires": <epoch ms>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry<T> {
    pub data: T,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub expires: Option<DateTime<Utc>>,
}

impl<T> StoredEntry<T> {
    /// Expired once `now` reaches the expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.map_or(false, |expires| now >= expires)
    }
}

/// Typed access to `Storage` under `{namespace}_{key}` keys.
#[derive(Debug, Clone)]
pub struct NamespacedStore {
    storage: Storage,
}

impl NamespacedStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn full_key(namespace: &str, key: &str) -> String {
        format!("{}_{}", namespace, key)
    }

    pub fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        self.get_at(namespace, key, Utc::now())
    }

    /// Read an entry as of `now`. Expired or unreadable entries are evicted.
    pub fn get_at<T: DeserializeOwned>(
        &self,
        namespace: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<T> {
        let full_key = Self::full_key(namespace, key);
        let raw = self.storage.get_item(&full_key)?;

        let entry: StoredEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Dropping unreadable stored entry");
                self.evict(&full_key);
                return None;
            }
        };

        if entry.is_expired_at(now) {
            debug!(key = %full_key, "Stored entry expired");
            self.evict(&full_key);
            return None;
        }

        Some(entry.data)
    }

    pub fn set<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        self.set_at(namespace, key, value, ttl, Utc::now())
    }

    /// Store `value`, expiring at `now + ttl` when a TTL is given.
    pub fn set_at<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let expires = ttl.map(|ttl| {
            let ms = i64::try_from(ttl.as_millis()).unwrap_or(MAX_TTL_MS).min(MAX_TTL_MS);
            now + chrono::Duration::milliseconds(ms)
        });
        let entry = StoredEntry { data: value, expires };
        let contents = serde_json::to_string(&entry)?;
        self.storage.set_item(&Self::full_key(namespace, key), contents)
    }

    pub fn remove(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.storage.remove_item(&Self::full_key(namespace, key))
    }

    /// Remove every entry in `namespace`, leaving other keys untouched.
    pub fn clear(&self, namespace: &str) -> Result<usize, StorageError> {
        self.storage.remove_prefixed(&format!("{}_", namespace))
    }

    fn evict(&self, full_key: &str) {
        if let Err(e) = self.storage.remove_item(full_key) {
            warn!(key = %full_key, error = %e, "Failed to evict stored entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_set_get_remove() {
        let storage = Storage::in_memory();
        assert_eq!(storage.get_item("theme"), None);
        storage.set_item("theme", "light").unwrap();
        assert_eq!(storage.get_item("theme").as_deref(), Some("light"));
        storage.remove_item("theme").unwrap();
        assert_eq!(storage.get_item("theme"), None);
        // Removing a missing key is fine
        storage.remove_item("theme").unwrap();
    }

    #[test]
    fn test_storage_clones_share_items() {
        let a = Storage::in_memory();
        let b = a.clone();
        a.set_item("k", "v").unwrap();
        assert_eq!(b.get_item("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_storage_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let storage = Storage::open(&path).unwrap();
        storage.set_item("session_token", "abc").unwrap();
        drop(storage);

        let reopened = Storage::open(&path).unwrap();
        assert_eq!(reopened.get_item("session_token").as_deref(), Some("abc"));
        assert_eq!(reopened.path(), Some(path.as_path()));
    }

    #[test]
    fn test_storage_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{not json").unwrap();

        let storage = Storage::open(&path).unwrap();
        assert!(storage.keys().is_empty());
        storage.set_item("k", "v").unwrap();

        let reopened = Storage::open(&path).unwrap();
        assert_eq!(reopened.get_item("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_namespaced_get_respects_expiry() {
        let store = NamespacedStore::new(Storage::in_memory());
        let now = Utc::now();
        store
            .set_at("cache", "teams", &vec![1, 2, 3], Some(Duration::from_millis(1000)), now)
            .unwrap();

        let before: Option<Vec<i32>> =
            store.get_at("cache", "teams", now + chrono::Duration::milliseconds(999));
        assert_eq!(before, Some(vec![1, 2, 3]));

        let at_expiry: Option<Vec<i32>> =
            store.get_at("cache", "teams", now + chrono::Duration::milliseconds(1000));
        assert_eq!(at_expiry, None);

        // Evicted as a side effect, even for an earlier query time
        assert_eq!(store.storage().get_item("cache_teams"), None);
        let after_evict: Option<Vec<i32>> = store.get_at("cache", "teams", now);
        assert_eq!(after_evict, None);
    }

    #[test]
    fn test_namespaced_without_ttl_never_expires() {
        let store = NamespacedStore::new(Storage::in_memory());
        store.set("prefs", "theme", &"dark", None).unwrap();
        let far_future = Utc::now() + chrono::Duration::days(3650);
        let theme: Option<String> = store.get_at("prefs", "theme", far_future);
        assert_eq!(theme.as_deref(), Some("dark"));
    }

    #[test]
    fn test_namespaced_wire_format() {
        let store = NamespacedStore::new(Storage::in_memory());
        let now = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        store
            .set_at("cache", "rating", &"x", Some(Duration::from_secs(5)), now)
            .unwrap();
        let raw = store.storage().get_item("cache_rating").unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["data"], "x");
        assert_eq!(value["expires"], 1_700_000_005_000_i64);
    }

    #[test]
    fn test_namespaced_unreadable_entry_is_evicted() {
        let storage = Storage::in_memory();
        storage.set_item("cache_teams", "garbage").unwrap();
        let store = NamespacedStore::new(storage.clone());
        let value: Option<Vec<i32>> = store.get("cache", "teams");
        assert_eq!(value, None);
        assert_eq!(storage.get_item("cache_teams"), None);
    }

    #[test]
    fn test_namespaced_clear_only_touches_namespace() {
        let storage = Storage::in_memory();
        storage.set_item("theme", "dark").unwrap();
        storage.set_item("cachex", "unrelated").unwrap();
        let store = NamespacedStore::new(storage.clone());
        store.set("cache", "teams", &1, Some(Duration::from_secs(30))).unwrap();
        store.set("cache", "rating", &2, Some(Duration::from_secs(5))).unwrap();
        store.set("session", "token", &"t", None).unwrap();

        assert_eq!(store.clear("cache").unwrap(), 2);

        let mut keys = storage.keys();
        keys.sort();
        assert_eq!(keys, vec!["cachex", "session_token", "theme"]);
    }
}
