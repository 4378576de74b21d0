use std::sync::Arc;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::store::CacheStatusStore;

const CACHED_MODELS_LIST: &str = "cached_models_list";
const CACHED_MODEL_PREFIX: &str = "cached_model_";
const RECORD_VERSION: &str = "1.0";
const DEFAULT_MODEL_KEY: &str = "defaultModel";

/// Marker appended to labels of models that were loaded before
pub const CACHED_MARKER: &str = " 💾";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedModelRecord {
    pub model_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub version: String,
}

fn record_key(model_id: &str) -> String {
    format!("{}{}", CACHED_MODEL_PREFIX, model_id)
}

/// Remembers which models have been loaded, for display only
#[derive(Clone)]
pub struct ModelCacheRegistry {
    store: Arc<dyn CacheStatusStore>,
}

impl ModelCacheRegistry {
    pub fn new(store: Arc<dyn CacheStatusStore>) -> Self {
        Self { store }
    }

    pub async fn is_cached(&self, model_id: &str) -> Result<bool> {
        let value = self.store.get(&record_key(model_id)).await?;
        Ok(value.is_some_and(|v| !v.is_null()))
    }

    pub async fn record(&self, model_id: &str) -> Result<Option<CachedModelRecord>> {
        match self.store.get(&record_key(model_id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Records for every listed model, in list order. Models without a record are skipped.
    pub async fn records(&self) -> Result<Vec<CachedModelRecord>> {
        let models = self.cached_models().await?;
        let keys: Vec<String> = models.iter().map(|m| record_key(m)).collect();
        let mut found = self.store.get_many(&keys).await?;

        let mut records = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(value) = found.remove(key).filter(|v| !v.is_null()) {
                records.push(serde_json::from_value(value)?);
            }
        }
        Ok(records)
    }

    pub async fn cached_models(&self) -> Result<Vec<String>> {
        match self.store.get(CACHED_MODELS_LIST).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn mark_cached(&self, model_id: &str) -> Result<()> {
        let record = CachedModelRecord {
            model_id: model_id.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            version: RECORD_VERSION.to_string(),
        };
        self.store.set(&record_key(model_id), serde_json::to_value(&record)?).await?;

        let mut models = self.cached_models().await?;
        if !models.iter().any(|m| m == model_id) {
            models.push(model_id.to_string());
            self.store.set(CACHED_MODELS_LIST, serde_json::to_value(&models)?).await?;
        }

        debug!("Marked {} as cached", model_id);
        Ok(())
    }

    /// Forget every cached model. Returns how many were listed.
    pub async fn clear(&self) -> Result<usize> {
        let models = self.cached_models().await?;
        let mut keys: Vec<String> = models.iter().map(|m| record_key(m)).collect();
        keys.push(CACHED_MODELS_LIST.to_string());

        self.store.remove(&keys).await?;
        info!("Model cache cleared ({} entries)", models.len());
        Ok(models.len())
    }

    /// Menu label for a model, with the cached marker when applicable
    pub fn label(label: &str, model_id: &str, cached_models: &[String]) -> String {
        if cached_models.iter().any(|m| m == model_id) && !label.contains(CACHED_MARKER.trim()) {
            format!("{}{}", label, CACHED_MARKER)
        } else {
            label.to_string()
        }
    }

    pub fn strip_marker(label: &str) -> String {
        label.replace(CACHED_MARKER, "")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub default_model: String,
}

/// User settings shared between the front-ends
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn CacheStatusStore>,
    fallback_model: String,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn CacheStatusStore>, fallback_model: impl Into<String>) -> Self {
        Self {
            store,
            fallback_model: fallback_model.into(),
        }
    }

    pub async fn get_settings(&self) -> Result<Settings> {
        let default_model = match self.store.get(DEFAULT_MODEL_KEY).await? {
            Some(Value::String(model)) if !model.is_empty() => model,
            _ => self.fallback_model.clone(),
        };
        Ok(Settings { default_model })
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.store
            .set(DEFAULT_MODEL_KEY, Value::String(settings.default_model.clone()))
            .await
    }

    /// First-run hook: write defaults without touching existing values
    pub async fn ensure_defaults(&self) -> Result<()> {
        if self.store.get(DEFAULT_MODEL_KEY).await?.is_none() {
            info!("Writing default settings (model {})", self.fallback_model);
            self.store
                .set(DEFAULT_MODEL_KEY, Value::String(self.fallback_model.clone()))
                .await?;
        }
        Ok(())
    }
}
