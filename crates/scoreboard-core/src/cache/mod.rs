//! Client-side storage and TTL caching.
//!
//! This module provides:
//! - `Storage`: a string-keyed key-value store, in memory or backed by a
//!   JSON file in the cache directory
//! - `NamespacedStore`: typed entries under a `{namespace}_` key prefix,
//!   with optional absolute expiry
//! - `CacheManager`: the `cache` namespace used for read-mostly API data
//!   (team list and rating)

pub mod manager;
pub mod store;

pub use manager::{CacheKey, CacheManager, CACHE_NAMESPACE};
pub use store::{NamespacedStore, Storage, StorageError, StoredEntry};
