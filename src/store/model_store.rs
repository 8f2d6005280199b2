use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use moka::sync::Cache;

use super::ModelBundle;
use crate::error::{RecommenderError, RecommenderResult};

/// Source of model bundles for a model path
#[cfg_attr(test, mockall::automock)]
pub trait BundleLoader: Send + Sync {
    fn load(&self, path: &Path) -> RecommenderResult<ModelBundle>;
}

/// Loads bundles from a directory of artifacts
#[derive(Debug, Clone)]
pub struct FsBundleLoader {
    pub ensemble_size: usize,
}

impl FsBundleLoader {
    pub fn new(ensemble_size: usize) -> Self {
        Self { ensemble_size }
    }
}

impl BundleLoader for FsBundleLoader {
    fn load(&self, path: &Path) -> RecommenderResult<ModelBundle> {
        ModelBundle::load(path, self.ensemble_size)
    }
}

/// Keyed store handing out shared bundles, loading each path at most once.
///
/// Loads of one path never block reads of bundles that are already loaded.
pub struct ModelStore {
    loader: Box<dyn BundleLoader>,
    bundles: Cache<PathBuf, Arc<ModelBundle>>,
}

impl ModelStore {
    pub fn new(loader: impl BundleLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            bundles: Cache::builder().build(),
        }
    }

    /// Returns the bundle for `path`, loading it on first use.
    ///
    /// Concurrent callers for the same path share one load. Failed loads are not
    /// cached; the next call retries the load.
    pub fn get(&self, path: &Path) -> RecommenderResult<Arc<ModelBundle>> {
        if let Some(bundle) = self.bundles.get(path) {
            return Ok(bundle);
        }

        self.bundles
            .try_get_with(path.to_path_buf(), || {
                tracing::info!(path = %path.display(), "Loading model bundle");
                self.loader.load(path).map(Arc::new).map_err(|e| {
                    tracing::error!(path = %path.display(), error = %e, "Model bundle failed to load");
                    e
                })
            })
            .map_err(|shared| {
                Arc::try_unwrap(shared)
                    .unwrap_or_else(|shared| RecommenderError::model_load(path, shared.to_string()))
            })
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        self.bundles.contains_key(path)
    }

    /// Drops the cached bundle; in-flight requests keep their `Arc`
    pub fn evict(&self, path: &Path) -> bool {
        self.bundles.remove(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::models::AverageItemScore;
    use crate::store::{
        AverageScoreTable, FactorArtifact, ModelArtifact, PopularityTable, TrainedModel,
    };

    fn tiny_bundle(path: &Path) -> ModelBundle {
        let model = TrainedModel::from_artifact(ModelArtifact::Implicit {
            weight: 1.0,
            factors: FactorArtifact {
                regularization: 0.1,
                item_ids: vec![1],
                item_factors: vec![vec![1.0]],
                user_ids: vec![7],
                user_factors: vec![vec![1.0]],
            },
        })
        .unwrap();
        ModelBundle::new(
            path,
            model,
            PopularityTable::from_counts(vec![(1, 4)]).unwrap(),
            AverageScoreTable::from_entries(vec![AverageItemScore {
                item_id: 1,
                ave_score: 3.0,
                ave_discounted_score: 2.0,
            }])
            .unwrap(),
            None,
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_loads_each_path_once() {
        let mut loader = MockBundleLoader::new();
        loader
            .expect_load()
            .times(1)
            .returning(|path| Ok(tiny_bundle(path)));

        let store = ModelStore::new(loader);
        let path = Path::new("/models/rssa");

        let first = store.get(path).unwrap();
        let second = store.get(path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(store.is_loaded(path));
    }

    #[test]
    fn test_paths_are_cached_independently() {
        let mut loader = MockBundleLoader::new();
        loader
            .expect_load()
            .times(2)
            .returning(|path| Ok(tiny_bundle(path)));

        let store = ModelStore::new(loader);
        let a = store.get(Path::new("/models/a")).unwrap();
        let b = store.get(Path::new("/models/b")).unwrap();

        assert_eq!(a.path, PathBuf::from("/models/a"));
        assert_eq!(b.path, PathBuf::from("/models/b"));
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let mut loader = MockBundleLoader::new();
        loader
            .expect_load()
            .times(2)
            .returning(|path| Err(RecommenderError::model_load(path, "missing model.json")));

        let store = ModelStore::new(loader);
        let path = Path::new("/models/broken");

        assert!(store.get(path).unwrap_err().is_fatal());
        assert!(store.get(path).is_err());
        assert!(!store.is_loaded(path));
    }

    #[test]
    fn test_evict_forces_reload() {
        let mut loader = MockBundleLoader::new();
        loader
            .expect_load()
            .times(2)
            .returning(|path| Ok(tiny_bundle(path)));

        let store = ModelStore::new(loader);
        let path = Path::new("/models/rssa");

        let before = store.get(path).unwrap();
        assert!(store.evict(path));
        assert!(!store.evict(path));
        let after = store.get(path).unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_loading_one_path_does_not_block_loaded_paths() {
        let mut loader = MockBundleLoader::new();
        loader.expect_load().times(2).returning(|path| {
            if path == Path::new("/models/slow") {
                std::thread::sleep(Duration::from_millis(800));
            }
            Ok(tiny_bundle(path))
        });

        let store = Arc::new(ModelStore::new(loader));
        let fast = Path::new("/models/fast");
        store.get(fast).unwrap();

        let slow_store = store.clone();
        let slow = std::thread::spawn(move || {
            slow_store
                .get(Path::new("/models/slow"))
                .map(|bundle| bundle.path.clone())
        });
        std::thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        let again = store.get(fast).unwrap();
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(again.path, PathBuf::from("/models/fast"));

        assert_eq!(slow.join().unwrap().unwrap(), PathBuf::from("/models/slow"));
    }
}
