use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{EmotionTarget, ItemId, LiveUserRatings, UserId};
use crate::services::DistanceMetric;

/// A recommendation request for one live user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    /// Opaque label for the live user; never looked up in the model
    pub user_id: String,
    pub ratings: LiveUserRatings,
    pub num_rec: usize,
    #[serde(flatten)]
    pub condition: Condition,
}

/// Experiment condition selecting which list flavor is produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    TopN,
    Hate,
    Hip,
    NoClue,
    Controversial,
    EmotionTopN(EmotionTuning),
    DiverseByEmotion(DiversityOptions),
    EmotionDiverseN {
        tuning: EmotionTuning,
        #[serde(default)]
        diversity: DiversityOptions,
        #[serde(default)]
        criterion: DiversityCriterion,
    },
    CommunityAdvisors,
    PreferenceViz(VizOptions),
}

impl Condition {
    /// Short label used in logs and cache keys
    pub fn name(&self) -> &'static str {
        match self {
            Condition::TopN => "top_n",
            Condition::Hate => "hate",
            Condition::Hip => "hip",
            Condition::NoClue => "no_clue",
            Condition::Controversial => "controversial",
            Condition::EmotionTopN(_) => "emotion_top_n",
            Condition::DiverseByEmotion(_) => "diverse_by_emotion",
            Condition::EmotionDiverseN { .. } => "emotion_diverse_n",
            Condition::CommunityAdvisors => "community_advisors",
            Condition::PreferenceViz(_) => "preference_viz",
        }
    }
}

/// How emotion-tuned candidates are ordered against the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionRanking {
    #[default]
    Distance,
    Weighted,
}

/// Emotion tuning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionTuning {
    pub target: EmotionTarget,
    #[serde(default)]
    pub ranking: EmotionRanking,
    /// Distance metric; defaults to Euclidean for closest-first and sqrt-city-block otherwise
    #[serde(default)]
    pub metric: Option<DistanceMetric>,
    #[serde(default = "default_closest_first")]
    pub closest_first: bool,
    /// Rescale the target by the per-axis range of the pool before measuring distance
    #[serde(default)]
    pub scale_vector: bool,
    #[serde(default)]
    pub item_pool_size: Option<usize>,
}

fn default_closest_first() -> bool {
    true
}

impl EmotionTuning {
    pub fn effective_metric(&self) -> DistanceMetric {
        self.metric.unwrap_or(if self.closest_first {
            DistanceMetric::Euclidean
        } else {
            DistanceMetric::SqrtCityBlock
        })
    }
}

/// Which emotion axes the diversifier spreads over before tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityCriterion {
    #[default]
    All,
    Unspecified,
}

/// Greedy diversification parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversityOptions {
    #[serde(default = "default_diversity_metric")]
    pub metric: DistanceMetric,
    /// Scale features by `weight_sigma` before measuring distance
    #[serde(default)]
    pub weighting: bool,
    #[serde(default)]
    pub weight_sigma: Option<f64>,
    /// Number of items selected by the diversifier; defaults to `num_rec`
    #[serde(default)]
    pub sampling_size: Option<usize>,
    #[serde(default)]
    pub item_pool_size: Option<usize>,
}

fn default_diversity_metric() -> DistanceMetric {
    DistanceMetric::SqrtCityBlock
}

impl Default for DiversityOptions {
    fn default() -> Self {
        Self {
            metric: default_diversity_metric(),
            weighting: false,
            weight_sigma: None,
            sampling_size: None,
            item_pool_size: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VizMode {
    Baseline,
    #[default]
    Diverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VizAlgorithm {
    Fishnet,
    SingleLinkage,
    #[default]
    FishnetSingleLinkage,
    Random,
    ConvexHull,
}

/// Where the community axis of the visualization comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunitySource {
    /// Training-set average discounted score
    #[default]
    Global,
    /// Mean predicted score over the live user's nearest training users
    NnPredicted,
}

/// Preference-visualization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VizOptions {
    #[serde(default)]
    pub mode: VizMode,
    #[serde(default)]
    pub algo: VizAlgorithm,
    /// Shuffle the final records with a seed derived from the rated items
    #[serde(default)]
    pub randomize: bool,
    #[serde(default)]
    pub init_sample_size: Option<usize>,
    #[serde(default)]
    pub min_rating_count: Option<u64>,
    #[serde(default)]
    pub community_source: CommunitySource,
}

/// One nearest-neighbor advisor exposed to the live user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorProfile {
    pub id: UserId,
    /// Uniformly sampled from the advisor's top predictions; `None` when nothing is left
    pub recommendation: Option<ItemId>,
    pub profile_top: Vec<ItemId>,
}

/// One point of the preference visualization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceVizItem {
    pub item_id: ItemId,
    pub community_score: f64,
    pub user_score: f64,
    pub community_label: u8,
    pub user_label: u8,
    pub cluster_id: Option<usize>,
}

/// Result of one recommendation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RecommendationResponse {
    Items(Vec<ItemId>),
    Advisors(BTreeMap<UserId, AdvisorProfile>),
    Visualization(Vec<PreferenceVizItem>),
}

impl RecommendationResponse {
    pub fn len(&self) -> usize {
        match self {
            RecommendationResponse::Items(items) => items.len(),
            RecommendationResponse::Advisors(advisors) => advisors.len(),
            RecommendationResponse::Visualization(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
