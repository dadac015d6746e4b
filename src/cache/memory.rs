//! In-memory response cache with optional JSON persistence.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt};

use crate::cache::{CacheError, CachedResponse, ResponseCache};
use crate::config::CacheConfig;
use crate::observability::metrics;

/// A thread-safe response cache.
#[derive(Clone, Default)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, CachedResponse>>,
    persistence_path: Option<PathBuf>,
    max_age: Option<Duration>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.inner.len())
            .field("persistence_path", &self.persistence_path)
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl MemoryCache {
    /// Create a new empty cache.
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
            max_age: None,
        }
    }

    /// Create a cache from configuration, loading the persistence file if set.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let cache = match &config.persistence_path {
            Some(path) => Self::load_from_file(Path::new(path))?,
            None => Self::new(None),
        };
        Ok(cache.with_max_age(config.max_age_secs.map(Duration::from_secs)))
    }

    /// Treat entries older than `max_age` as missing.
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    /// Load from file if exists.
    pub fn load_from_file(path: &Path) -> Result<Self, CacheError> {
        let cache = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let map: HashMap<String, CachedResponse> = serde_json::from_reader(reader)?;

            for (k, v) in map {
                cache.inner.insert(k, v);
            }
            metrics::record_cache_size(cache.inner.len());
            tracing::info!(entries = cache.inner.len(), path = ?path, "Loaded response cache");
        }
        Ok(cache)
    }

    /// Save to file, if a persistence path is set.
    pub fn save_to_file(&self) -> Result<(), CacheError> {
        if let Some(path) = &self.persistence_path {
            let writer = BufWriter::new(File::create(path)?);

            let map: HashMap<_, _> = self
                .inner
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect();

            serde_json::to_writer(writer, &map)?;
            tracing::info!(entries = map.len(), path = ?path, "Saved response cache");
        }
        Ok(())
    }

    pub fn insert(&self, key: impl Into<String>, response: CachedResponse) {
        self.inner.insert(key.into(), response);
        metrics::record_cache_size(self.inner.len());
    }

    /// Get a fresh entry.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let entry = self.inner.get(key).map(|r| r.value().clone())?;
        match self.max_age {
            Some(max_age) if entry.age_secs() > max_age.as_secs() => {
                tracing::debug!(key, age_secs = entry.age_secs(), "Cache entry expired");
                None
            }
            _ => Some(entry),
        }
    }

    pub fn remove(&self, key: &str) -> Option<CachedResponse> {
        let removed = self.inner.remove(key).map(|(_, v)| v);
        metrics::record_cache_size(self.inner.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl ResponseCache for MemoryCache {
    fn lookup(&self, key: &str) -> BoxFuture<'static, Result<Option<CachedResponse>, CacheError>> {
        future::ready(Ok(self.get(key))).boxed()
    }

    fn store(&self, key: &str, response: CachedResponse) -> BoxFuture<'static, Result<(), CacheError>> {
        self.insert(key, response);
        future::ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_operations() {
        let cache = MemoryCache::new(None);
        assert!(cache.get("/users").is_none());

        cache.insert("/users", CachedResponse::new(200, "[]"));
        let entry = cache.get("/users").unwrap();
        assert_eq!(entry.status, 200);
        assert_eq!(cache.len(), 1);

        assert!(cache.remove("/users").is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_max_age() {
        let cache = MemoryCache::new(None).with_max_age(Some(Duration::from_secs(30)));

        let mut stale = CachedResponse::new(200, "{}");
        stale.stored_at -= 60;
        cache.insert("/stale", stale);
        cache.insert("/fresh", CachedResponse::new(200, "{}"));

        assert!(cache.get("/stale").is_none());
        assert!(cache.get("/fresh").is_some());
    }

    #[test]
    fn test_persistence() {
        let path = std::env::temp_dir().join(format!("resilient_client_cache_{}.json", uuid::Uuid::new_v4()));

        let cache = MemoryCache::new(Some(path.clone()));
        cache.insert("/items?page=2", CachedResponse::new(200, r#"{"page": 2}"#));
        cache.save_to_file().unwrap();

        let loaded = MemoryCache::load_from_file(&path).unwrap();
        let entry = loaded.get("/items?page=2").unwrap();
        assert_eq!(entry.body, r#"{"page": 2}"#);

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_load_malformed_file() {
        let path = std::env::temp_dir().join(format!("resilient_client_cache_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(MemoryCache::load_from_file(&path), Err(CacheError::Malformed(_))));

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[tokio::test]
    async fn test_trait_lookup_and_store() {
        let cache = MemoryCache::new(None);
        ResponseCache::store(&cache, "/a", CachedResponse::new(404, "null")).await.unwrap();

        let hit = cache.lookup("/a").await.unwrap().unwrap();
        assert_eq!(hit.status, 404);
        assert!(cache.lookup("/b").await.unwrap().is_none());
    }
}
