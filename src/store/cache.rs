use std::{
    collections::{HashMap, VecDeque},
    fmt::Display,
    path::Path,
};

use tokio::sync::RwLock;

use crate::error::RecommenderResult;
use crate::models::{RecommendationRequest, RecommendationResponse};

/// Cache key covering the model path and the full request payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_request(model_path: &Path, request: &RecommendationRequest) -> RecommenderResult<Self> {
        let payload = serde_json::to_string(request)?;
        Ok(Self(format!("{}:{}", model_path.display(), payload)))
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, RecommendationResponse>,
    order: VecDeque<CacheKey>,
}

/// Bounded request/response cache with FIFO eviction; capacity 0 disables it
pub struct ResponseCache {
    capacity: usize,
    inner: RwLock<CacheInner>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    pub async fn get_from_cache(
        &self,
        key: &CacheKey,
    ) -> RecommenderResult<Option<RecommendationResponse>> {
        let inner = self.inner.read().await;
        let hit = inner.entries.get(key).cloned();
        if hit.is_some() {
            tracing::debug!("Response cache hit");
        }
        Ok(hit)
    }

    /// Stores a response; re-inserting a key keeps its original eviction position
    pub async fn insert(&self, key: CacheKey, value: RecommendationResponse) {
        if self.capacity == 0 {
            return;
        }

        let mut inner = self.inner.write().await;
        if inner.entries.insert(key.clone(), value).is_none() {
            inner.order.push_back(key);
        }

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                tracing::debug!("Evicted oldest cached response");
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, LiveUserRatings, Rating};

    fn key(n: u64) -> CacheKey {
        let request = RecommendationRequest {
            user_id: "p".to_string(),
            ratings: LiveUserRatings::new(vec![Rating::new(n, 4.0)]),
            num_rec: 5,
            condition: Condition::TopN,
        };
        CacheKey::for_request(Path::new("/models/rssa"), &request).unwrap()
    }

    #[tokio::test]
    async fn test_hit_after_insert() {
        let cache = ResponseCache::new(2);
        cache
            .insert(key(1), RecommendationResponse::Items(vec![3, 4]))
            .await;

        let hit = cache.get_from_cache(&key(1)).await.unwrap();
        assert_eq!(hit, Some(RecommendationResponse::Items(vec![3, 4])));
        assert!(cache.get_from_cache(&key(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_evicts_oldest_first() {
        let cache = ResponseCache::new(2);
        cache.insert(key(1), RecommendationResponse::Items(vec![1])).await;
        cache.insert(key(2), RecommendationResponse::Items(vec![2])).await;
        // Re-inserting does not refresh the key's position
        cache.insert(key(1), RecommendationResponse::Items(vec![9])).await;
        cache.insert(key(3), RecommendationResponse::Items(vec![3])).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get_from_cache(&key(1)).await.unwrap().is_none());
        assert!(cache.get_from_cache(&key(2)).await.unwrap().is_some());
        assert!(cache.get_from_cache(&key(3)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_cache() {
        let cache = ResponseCache::new(0);
        cache.insert(key(1), RecommendationResponse::Items(vec![1])).await;
        assert!(cache.is_empty().await);
    }

    #[test]
    fn test_key_depends_on_model_path() {
        let request = RecommendationRequest {
            user_id: "p".to_string(),
            ratings: LiveUserRatings::default(),
            num_rec: 5,
            condition: Condition::Hate,
        };
        let a = CacheKey::for_request(Path::new("/models/a"), &request).unwrap();
        let b = CacheKey::for_request(Path::new("/models/b"), &request).unwrap();
        assert_ne!(a, b);
    }
}
