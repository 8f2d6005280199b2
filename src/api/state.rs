use std::sync::Arc;

use crate::config::Config;
use crate::store::{BundleLoader, FsBundleLoader, ModelStore, ResponseCache};

/// Shared recommender state, cheap to clone across tasks
#[derive(Clone)]
pub struct RecommenderState {
    pub config: Arc<Config>,
    pub store: Arc<ModelStore>,
    pub cache: Arc<ResponseCache>,
}

impl RecommenderState {
    /// State backed by model artifacts on disk
    pub fn new(config: Config) -> Self {
        let loader = FsBundleLoader::new(config.ensemble_size);
        Self::with_loader(config, loader)
    }

    pub fn with_loader(config: Config, loader: impl BundleLoader + 'static) -> Self {
        let cache = ResponseCache::new(config.cache_capacity);
        Self {
            config: Arc::new(config),
            store: Arc::new(ModelStore::new(loader)),
            cache: Arc::new(cache),
        }
    }
}
