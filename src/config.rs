use std::path::PathBuf;

use serde::Deserialize;

use crate::services::{DenominatorRule, NeighborMetric};

/// Environment variable prefix for every configuration key
pub const ENV_PREFIX: &str = "RSSA_";

/// Recommender configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Directory holding `model.json`, the CSV tables and the resampled ensemble
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Popularity discount coefficient (alpha)
    #[serde(default = "default_discount_coefficient")]
    pub discount_coefficient: f64,

    /// How the popularity count denominator is derived from the largest count
    #[serde(default)]
    pub denominator_rule: DenominatorRule,

    /// Candidate pool for emotion tuning and diversification
    #[serde(default = "default_candidate_pool_size")]
    pub candidate_pool_size: usize,

    /// Pool of top discounted items re-sorted by popularity for hip items
    #[serde(default = "default_hip_pool_size")]
    pub hip_pool_size: usize,

    /// Per-advisor pool of top predictions the recommendation is sampled from
    #[serde(default = "default_advisor_pool_size")]
    pub advisor_pool_size: usize,

    /// Neighbors searched before the closest advisors are kept
    #[serde(default = "default_advisor_search_space")]
    pub advisor_search_space: usize,

    /// Neighbors used for controversy variance
    #[serde(default = "default_controversy_neighbors")]
    pub controversy_neighbors: usize,

    #[serde(default)]
    pub neighbor_metric: NeighborMetric,

    /// Number of `resampled_model_{i}.json` files loaded with the bundle
    #[serde(default = "default_ensemble_size")]
    pub ensemble_size: usize,

    /// Target value for a discrete "low" emotion
    #[serde(default = "default_emotion_low")]
    pub emotion_low: f64,

    /// Target value for a discrete "high" emotion
    #[serde(default = "default_emotion_high")]
    pub emotion_high: f64,

    #[serde(default = "default_viz_min_rating_count")]
    pub viz_min_rating_count: u64,

    #[serde(default = "default_viz_init_sample_size")]
    pub viz_init_sample_size: usize,

    /// Request/response cache capacity
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models/rssa")
}

fn default_discount_coefficient() -> f64 {
    0.5
}

fn default_candidate_pool_size() -> usize {
    200
}

fn default_hip_pool_size() -> usize {
    1000
}

fn default_advisor_pool_size() -> usize {
    200
}

fn default_advisor_search_space() -> usize {
    200
}

fn default_controversy_neighbors() -> usize {
    20
}

fn default_ensemble_size() -> usize {
    20
}

fn default_emotion_low() -> f64 {
    0.3
}

fn default_emotion_high() -> f64 {
    0.8
}

fn default_viz_min_rating_count() -> u64 {
    50
}

fn default_viz_init_sample_size() -> usize {
    500
}

fn default_cache_capacity() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            discount_coefficient: default_discount_coefficient(),
            denominator_rule: DenominatorRule::default(),
            candidate_pool_size: default_candidate_pool_size(),
            hip_pool_size: default_hip_pool_size(),
            advisor_pool_size: default_advisor_pool_size(),
            advisor_search_space: default_advisor_search_space(),
            controversy_neighbors: default_controversy_neighbors(),
            neighbor_metric: NeighborMetric::default(),
            ensemble_size: default_ensemble_size(),
            emotion_low: default_emotion_low(),
            emotion_high: default_emotion_high(),
            viz_min_rating_count: default_viz_min_rating_count(),
            viz_init_sample_size: default_viz_init_sample_size(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from `RSSA_`-prefixed environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::prefixed(ENV_PREFIX)
            .from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Load configuration from explicit key/value pairs (keys carry the prefix)
    pub fn from_pairs<I>(pairs: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Config>(pairs)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tuned_constants() {
        let config = Config::from_pairs(Vec::new()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.discount_coefficient, 0.5);
        assert_eq!(config.candidate_pool_size, 200);
        assert_eq!(config.hip_pool_size, 1000);
        assert_eq!(config.controversy_neighbors, 20);
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.denominator_rule, DenominatorRule::DigitCount);
        assert_eq!(config.neighbor_metric, NeighborMetric::Cosine);
    }

    #[test]
    fn test_overrides_from_pairs() {
        let config = Config::from_pairs(vec![
            ("RSSA_MODEL_DIR".to_string(), "/srv/models/ers".to_string()),
            ("RSSA_DISCOUNT_COEFFICIENT".to_string(), "0.25".to_string()),
            ("RSSA_ENSEMBLE_SIZE".to_string(), "5".to_string()),
            ("RSSA_NEIGHBOR_METRIC".to_string(), "euclidean".to_string()),
            (
                "RSSA_DENOMINATOR_RULE".to_string(),
                "ceil_power_of_ten".to_string(),
            ),
        ])
        .unwrap();

        assert_eq!(config.model_dir, PathBuf::from("/srv/models/ers"));
        assert_eq!(config.discount_coefficient, 0.25);
        assert_eq!(config.ensemble_size, 5);
        assert_eq!(config.neighbor_metric, NeighborMetric::Euclidean);
        assert_eq!(config.denominator_rule, DenominatorRule::CeilPowerOfTen);
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        let result = Config::from_pairs(vec![(
            "RSSA_CACHE_CAPACITY".to_string(),
            "plenty".to_string(),
        )]);
        assert!(result.is_err());
    }
}
