use std::collections::HashMap;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, TrilingoError};

/// String-keyed record store used for cache status and settings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStatusStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Fetch several keys at once; missing keys are absent from the map
    async fn get_many(&self, keys: &[String]) -> Result<Map<String, Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove every listed key; missing keys are ignored
    async fn remove(&self, keys: &[String]) -> Result<()>;
}

/// In-process store, mostly for tests and one-shot commands
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStatusStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Map<String, Value>> {
        let entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(key).map(|v| (key.clone(), v.clone())))
            .collect())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Map::new()),
            Ok(content) => match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => Ok(map),
                _ => Err(TrilingoError::Storage(format!(
                    "{} does not contain a JSON object",
                    self.path.display()
                ))),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(TrilingoError::Io(e)),
        }
    }

    async fn save(&self, map: Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(&Value::Object(map))?;
        tokio::fs::write(&self.path, content).await?;
        debug!("Saved store to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl CacheStatusStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Map<String, Value>> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|key| map.remove(key).map(|v| (key.clone(), v)))
            .collect())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), value);
        self.save(map).await
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        let before = map.len();
        for key in keys {
            map.remove(key);
        }
        if map.len() != before {
            self.save(map).await?;
        }
        Ok(())
    }
}
