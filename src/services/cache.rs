use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::detection::ModelHandle;
use crate::services::detector::{LoadError, ModelLoader};

pub const FAST_MODEL_ID: &str = "fast";
pub const ACCURATE_MODEL_ID: &str = "accurate";

/// Maps logical model identifiers to weights locations.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    paths: HashMap<String, PathBuf>,
    default_path: PathBuf,
}

impl ModelRegistry {
    pub fn new(default_path: impl Into<PathBuf>) -> Self {
        Self {
            paths: HashMap::new(),
            default_path: default_path.into(),
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(model_id.into(), path.into());
        self
    }

    /// Location backing `model_id`. Unknown identifiers resolve to the default
    /// weights rather than failing.
    pub fn resolve_path(&self, model_id: &str) -> ResolvedPath<'_> {
        match self.paths.get(model_id) {
            Some(path) => ResolvedPath {
                path,
                fallback: false,
            },
            None => ResolvedPath {
                path: &self.default_path,
                fallback: true,
            },
        }
    }

    pub fn default_path(&self) -> &Path {
        &self.default_path
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new("yolo11n.pt")
            .with_model(FAST_MODEL_ID, "yolo11n_custom.pt")
            .with_model(ACCURATE_MODEL_ID, "yolo11l_custom.pt")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPath<'a> {
    pub path: &'a Path,
    /// True when the identifier was not registered and the default was used.
    pub fallback: bool,
}

/// Lazily-populated cache of loaded models.
///
/// A single cache-wide lock is held across the check-and-load, so each
/// identifier is constructed at most once even when many jobs ask for it at
/// the same time. Failed loads leave no entry behind and are retried by the
/// next caller. Entries are never evicted.
pub struct ResourceCache {
    loader: Arc<dyn ModelLoader>,
    registry: ModelRegistry,
    loaded: Mutex<HashMap<String, Arc<ModelHandle>>>,
}

impl ResourceCache {
    pub fn new(loader: Arc<dyn ModelLoader>, registry: ModelRegistry) -> Self {
        Self {
            loader,
            registry,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, model_id: &str) -> Result<Arc<ModelHandle>, LoadError> {
        let mut loaded = self.loaded.lock().await;
        if let Some(handle) = loaded.get(model_id) {
            return Ok(Arc::clone(handle));
        }

        let resolved = self.registry.resolve_path(model_id);
        if resolved.fallback {
            warn!(
                model_id = %model_id,
                path = %resolved.path.display(),
                "Unknown model identifier, falling back to default weights"
            );
            metrics::counter!("model_fallback_total").increment(1);
        }

        info!(
            model_id = %model_id,
            path = %resolved.path.display(),
            "Loading model into memory"
        );
        let start = Instant::now();
        let handle = Arc::new(self.loader.load(model_id, resolved.path).await?);

        metrics::counter!("model_cold_loads_total", "model" => model_id.to_string()).increment(1);
        info!(
            model_id = %model_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model loaded"
        );

        loaded.insert(model_id.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Identifiers currently resident, sorted. `None` while a load holds the lock.
    pub fn try_loaded_ids(&self) -> Option<Vec<String>> {
        let loaded = self.loaded.try_lock().ok()?;
        let mut ids: Vec<String> = loaded.keys().cloned().collect();
        ids.sort();
        Some(ids)
    }

    pub async fn len(&self) -> usize {
        self.loaded.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingLoader {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl ModelLoader for CountingLoader {
        async fn load(&self, model_id: &str, path: &Path) -> Result<ModelHandle, LoadError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_first && n == 0 {
                return Err(LoadError::Failed {
                    model_id: model_id.to_string(),
                    path: path.display().to_string(),
                    reason: "weights missing".to_string(),
                });
            }
            Ok(ModelHandle {
                model_id: model_id.to_string(),
                path: path.to_path_buf(),
                token: format!("h{}", n),
            })
        }
    }

    #[test]
    fn test_registry_known_and_fallback() {
        let registry = ModelRegistry::default();
        let fast = registry.resolve_path("fast");
        assert_eq!(fast.path, Path::new("yolo11n_custom.pt"));
        assert!(!fast.fallback);

        let unknown = registry.resolve_path("unknown-id");
        assert_eq!(unknown.path, Path::new("yolo11n.pt"));
        assert!(unknown.fallback);
    }

    #[tokio::test]
    async fn test_second_resolve_hits_cache() {
        let loader = Arc::new(CountingLoader::default());
        let cache = ResourceCache::new(loader.clone(), ModelRegistry::default());

        let first = cache.resolve("accurate").await.unwrap();
        let second = cache.resolve("accurate").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.path, PathBuf::from("yolo11l_custom.pt"));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.try_loaded_ids(), Some(vec!["accurate".to_string()]));
    }

    #[tokio::test]
    async fn test_concurrent_first_access_loads_once() {
        let loader = Arc::new(CountingLoader::default());
        let cache = Arc::new(ResourceCache::new(loader.clone(), ModelRegistry::default()));

        let tasks: Vec<_> = (0..12)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.resolve("fast").await.map(|h| h.token.clone()) })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            assert_eq!(task.unwrap().unwrap(), "h0");
        }
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let loader = Arc::new(CountingLoader {
            fail_first: true,
            ..Default::default()
        });
        let cache = ResourceCache::new(loader.clone(), ModelRegistry::default());

        let err = cache.resolve("fast").await.unwrap_err();
        assert!(err.to_string().contains("weights missing"));
        assert!(cache.is_empty().await);

        let handle = cache.resolve("fast").await.unwrap();
        assert_eq!(handle.token, "h1");
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_id_uses_default_path() {
        let loader = Arc::new(CountingLoader::default());
        let cache = ResourceCache::new(loader, ModelRegistry::default());

        let handle = cache.resolve("unknown-id").await.unwrap();
        assert_eq!(handle.model_id, "unknown-id");
        assert_eq!(handle.path, cache.registry().default_path());
    }
}
