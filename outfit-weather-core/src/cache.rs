//! Key-value store for resolved historical records.
//!
//! The cache is an optimisation only: callers treat read failures as misses
//! and ignore failed writes after logging them.

use std::{
    collections::HashMap,
    fmt::Debug,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::{error::WeatherError, model::CachedHistoricalEntry};

#[async_trait]
pub trait WeatherCache: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Result<Option<CachedHistoricalEntry>, WeatherError>;
    async fn put(&self, key: &str, entry: &CachedHistoricalEntry) -> Result<(), WeatherError>;
    async fn delete(&self, key: &str) -> Result<(), WeatherError>;
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CachedHistoricalEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

#[async_trait]
impl WeatherCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CachedHistoricalEntry>, WeatherError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, entry: &CachedHistoricalEntry) -> Result<(), WeatherError> {
        self.entries.write().insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), WeatherError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// All entries in one JSON document on disk.
///
/// Loaded on first access and rewritten whole after every mutation.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<Option<HashMap<String, CachedHistoricalEntry>>>,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), entries: Mutex::new(None) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, CachedHistoricalEntry>, WeatherError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(self.decode(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(WeatherError::Cache(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Entries that fail to decode are dropped one by one; only a document
    /// that is not a JSON object at all is discarded whole.
    fn decode(&self, bytes: &[u8]) -> HashMap<String, CachedHistoricalEntry> {
        let raw: HashMap<String, serde_json::Value> = match serde_json::from_slice(bytes) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable weather cache");
                return HashMap::new();
            }
        };

        raw.into_iter()
            .filter_map(|(key, value)| match serde_json::from_value(value) {
                Ok(entry) => Some((key, entry)),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "dropping malformed weather cache entry");
                    None
                }
            })
            .collect()
    }

    async fn persist(
        &self,
        entries: &HashMap<String, CachedHistoricalEntry>,
    ) -> Result<(), WeatherError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                WeatherError::Cache(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| WeatherError::Cache(format!("failed to serialize cache: {e}")))?;

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| WeatherError::Cache(format!("failed to write {}: {e}", self.path.display())))
    }
}

#[async_trait]
impl WeatherCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<CachedHistoricalEntry>, WeatherError> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn put(&self, key: &str, entry: &CachedHistoricalEntry) -> Result<(), WeatherError> {
        let mut guard = self.entries.lock().await;
        let mut entries = match guard.take() {
            Some(entries) => entries,
            None => self.load().await?,
        };
        entries.insert(key.to_string(), entry.clone());
        let result = self.persist(&entries).await;
        *guard = Some(entries);
        result
    }

    async fn delete(&self, key: &str) -> Result<(), WeatherError> {
        let mut guard = self.entries.lock().await;
        let mut entries = match guard.take() {
            Some(entries) => entries,
            None => self.load().await?,
        };
        let removed = entries.remove(key).is_some();
        let result = if removed { self.persist(&entries).await } else { Ok(()) };
        *guard = Some(entries);
        result
    }
}
