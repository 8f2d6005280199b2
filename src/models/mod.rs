use serde::{Deserialize, Serialize};
use std::{
    collections::{hash_map::DefaultHasher, HashSet},
    hash::{Hash, Hasher},
};

pub mod emotion;
pub mod recommendation;

pub use emotion::{EmotionLevel, EmotionTag, EmotionTarget, EmotionVector, NormalizedEmotionTarget};
pub use recommendation::{
    AdvisorProfile, CommunitySource, Condition, DiversityCriterion, DiversityOptions, EmotionRanking, EmotionTuning,
    PreferenceVizItem, RecommendationRequest, RecommendationResponse, VizAlgorithm, VizMode,
    VizOptions,
};

/// Item (movie) identifier shared by the model and every table
pub type ItemId = u64;

/// Training-set user identifier
pub type UserId = u64;

/// A single rating collected from the live user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub item_id: ItemId,
    pub rating: f64,
}

impl Rating {
    pub fn new(item_id: ItemId, rating: f64) -> Self {
        Self { item_id, rating }
    }
}

/// Ratings supplied by the live user for the current request
///
/// Item ids are unique; a later rating of the same item replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Rating>", into = "Vec<Rating>")]
pub struct LiveUserRatings {
    ratings: Vec<Rating>,
}

impl From<Vec<Rating>> for LiveUserRatings {
    fn from(ratings: Vec<Rating>) -> Self {
        Self::new(ratings)
    }
}

impl From<LiveUserRatings> for Vec<Rating> {
    fn from(ratings: LiveUserRatings) -> Self {
        ratings.ratings
    }
}

impl LiveUserRatings {
    pub fn new(ratings: Vec<Rating>) -> Self {
        let mut unique: Vec<Rating> = Vec::with_capacity(ratings.len());
        for rating in ratings {
            if let Some(existing) = unique.iter_mut().find(|r| r.item_id == rating.item_id) {
                existing.rating = rating.rating;
            } else {
                unique.push(rating);
            }
        }
        Self { ratings: unique }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rating> {
        self.ratings.iter()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Ids of every rated item, excluded from all outputs
    pub fn rated_items(&self) -> HashSet<ItemId> {
        self.ratings.iter().map(|r| r.item_id).collect()
    }

    /// Deterministic seed derived from the rated item set (order-independent)
    pub fn seed(&self) -> u64 {
        let mut ids: Vec<ItemId> = self.ratings.iter().map(|r| r.item_id).collect();
        ids.sort_unstable();
        let mut hasher = DefaultHasher::new();
        ids.hash(&mut hasher);
        hasher.finish()
    }
}

/// Popularity of an item in the training data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPopularity {
    pub item_id: ItemId,
    pub count: u64,
    /// Dense rank by descending count (1 = most popular)
    pub rank: u64,
}

/// Population-average score of an item across training users
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageItemScore {
    pub item_id: ItemId,
    pub ave_score: f64,
    pub ave_discounted_score: f64,
}

/// A live-user prediction enriched with popularity and optional per-condition signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: ItemId,
    pub raw_score: f64,
    pub discounted_score: f64,
    pub popularity_count: u64,
    pub popularity_rank: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensemble_std: Option<f64>,
}
