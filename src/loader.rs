use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

use crate::error::{Result, TrilingoError};
use crate::inference::{InferenceProvider, LoadProgress};
use crate::registry::ModelCacheRegistry;

/// Progress update surfaced to whoever drives the load (CLI progress bar, logs)
#[derive(Debug, Clone, PartialEq)]
pub struct LoadStatus {
    pub model: String,
    pub from_cache: bool,
    pub percent: u8,
    pub detail: String,
}

impl LoadStatus {
    pub fn message(&self) -> String {
        if self.from_cache {
            format!("🚀 Loading from cache: {}%", self.percent)
        } else {
            format!("📥 Downloading {}: {}%", self.model, self.percent)
        }
    }
}

pub type StatusSender = UnboundedSender<LoadStatus>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub model: String,
    pub was_cached: bool,
}

/// Loads models through the provider and keeps the cache registry current
#[derive(Clone)]
pub struct ModelLoader {
    provider: Arc<dyn InferenceProvider>,
    registry: ModelCacheRegistry,
}

impl ModelLoader {
    pub fn new(provider: Arc<dyn InferenceProvider>, registry: ModelCacheRegistry) -> Self {
        Self { provider, registry }
    }

    pub fn registry(&self) -> &ModelCacheRegistry {
        &self.registry
    }

    pub async fn load(&self, model: &str, status: Option<StatusSender>) -> Result<LoadOutcome> {
        let was_cached = match self.registry.is_cached(model).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Could not check cache, assuming not cached: {}", e);
                false
            }
        };

        if was_cached {
            info!("🚀 Loading {} from cache...", model);
        } else {
            info!("📥 Downloading {} (first time, will be cached)...", model);
        }

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<LoadProgress>();

        let load = self.provider.load_model(model, Some(progress_tx));
        let relay = async {
            while let Some(progress) = progress_rx.recv().await {
                let update = LoadStatus {
                    model: model.to_string(),
                    from_cache: was_cached,
                    percent: (progress.fraction.clamp(0.0, 1.0) * 100.0).round() as u8,
                    detail: progress.text,
                };
                debug!("{} ({})", update.message(), update.detail);
                if let Some(tx) = &status {
                    let _ = tx.send(update);
                }
            }
        };

        let (result, ()) = tokio::join!(load, relay);
        result.map_err(|e| match e {
            TrilingoError::ModelLoad(msg) => TrilingoError::ModelLoad(msg),
            other => TrilingoError::ModelLoad(other.to_string()),
        })?;

        if let Err(e) = self.registry.mark_cached(model).await {
            warn!("Could not save {} to cache registry: {}", model, e);
        }

        info!("✅ {} ready! (cached for future use)", model);
        Ok(LoadOutcome {
            model: model.to_string(),
            was_cached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::MockInferenceProvider;
    use crate::store::MemoryStore;

    fn registry() -> ModelCacheRegistry {
        ModelCacheRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_load_relays_progress_and_marks_cached() {
        let mut provider = MockInferenceProvider::new();
        provider
            .expect_load_model()
            .withf(|model, progress| model.eq_ignore_ascii_case("llama3.2:1b") && progress.is_some())
            .times(2)
            .returning(|_, progress| {
                if let Some(tx) = progress {
                    tx.send(LoadProgress { fraction: 0.5, text: "pulling".to_string() }).unwrap();
                    tx.send(LoadProgress { fraction: 1.0, text: "success".to_string() }).unwrap();
                }
                Ok(())
            });

        let registry = registry();
        let loader = ModelLoader::new(Arc::new(provider), registry.clone());

        let (status_tx, mut status_rx) = mpsc::unbounded_channel();
        let outcome = loader.load("llama3.2:1b", Some(status_tx)).await.unwrap();
        assert!(!outcome.was_cached);
        assert!(registry.is_cached("llama3.2:1b").await.unwrap());

        let first = status_rx.recv().await.unwrap();
        assert_eq!(first.percent, 50);
        assert_eq!(first.message(), "📥 Downloading llama3.2:1b: 50%");
        assert_eq!(status_rx.recv().await.unwrap().percent, 100);

        let again = loader.load("llama3.2:1b", None).await.unwrap();
        assert!(again.was_cached);
    }

    #[tokio::test]
    async fn test_load_failure_is_model_load_error_and_not_cached() {
        let mut provider = MockInferenceProvider::new();
        provider
            .expect_load_model()
            .returning(|_, _| Err(TrilingoError::Inference("out of memory".to_string())));

        let registry = registry();
        let loader = ModelLoader::new(Arc::new(provider), registry.clone());

        let err = loader.load("gemma2:2b", None).await.unwrap_err();
        assert!(matches!(err, TrilingoError::ModelLoad(msg) if msg.contains("out of memory")));
        assert!(!registry.is_cached("gemma2:2b").await.unwrap());
    }
}
