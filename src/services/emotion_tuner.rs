use std::cmp::Ordering;

use crate::models::{
    EmotionRanking, EmotionTag, EmotionTuning, EmotionVector, NormalizedEmotionTarget, ScoredItem,
};
use crate::services::{ranking::cmp_desc, DistanceMetric};
use crate::store::EmotionTable;

/// A scored item together with its emotion profile
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionCandidate {
    pub item: ScoredItem,
    pub profile: EmotionVector,
}

impl EmotionCandidate {
    pub fn features(&self, tags: &[EmotionTag]) -> Vec<f64> {
        NormalizedEmotionTarget::project(&self.profile, tags)
    }
}

/// Takes the first `pool_size` ranked items and keeps those with an emotion profile
pub fn candidate_pool(
    ranked: &[ScoredItem],
    emotions: &EmotionTable,
    pool_size: usize,
) -> Vec<EmotionCandidate> {
    ranked
        .iter()
        .take(pool_size)
        .filter_map(|item| {
            emotions.get(item.item_id).map(|profile| EmotionCandidate {
                item: item.clone(),
                profile: *profile,
            })
        })
        .collect()
}

/// Orders emotion candidates against a normalized target
pub struct EmotionTuner<'a> {
    target: &'a NormalizedEmotionTarget,
    metric: DistanceMetric,
    closest_first: bool,
    scale_vector: bool,
}

impl<'a> EmotionTuner<'a> {
    pub fn new(
        target: &'a NormalizedEmotionTarget,
        metric: DistanceMetric,
        closest_first: bool,
        scale_vector: bool,
    ) -> Self {
        Self {
            target,
            metric,
            closest_first,
            scale_vector,
        }
    }

    pub fn from_tuning(target: &'a NormalizedEmotionTarget, tuning: &EmotionTuning) -> Self {
        Self::new(
            target,
            tuning.effective_metric(),
            tuning.closest_first,
            tuning.scale_vector,
        )
    }

    pub fn rank(&self, ranking: EmotionRanking, pool: Vec<EmotionCandidate>) -> Vec<EmotionCandidate> {
        match ranking {
            EmotionRanking::Distance => self.rank_by_distance(pool),
            EmotionRanking::Weighted => self.rank_weighted(pool),
        }
    }

    /// Sorts by distance over the specified tags; with no specified tags the pool is returned as is
    pub fn rank_by_distance(&self, mut pool: Vec<EmotionCandidate>) -> Vec<EmotionCandidate> {
        if self.target.is_unspecified() || pool.is_empty() {
            return pool;
        }

        let tags = &self.target.specified;
        let target = if self.scale_vector {
            let ranges = axis_ranges(&pool, tags);
            self.target
                .values
                .iter()
                .zip(ranges.iter())
                .map(|(value, (min, max))| (max - min) * value)
                .collect()
        } else {
            self.target.values.clone()
        };

        for candidate in pool.iter_mut() {
            let features = candidate.features(tags);
            candidate.item.emotion_distance = Some(self.metric.distance(&features, &target));
        }

        let distance = |c: &EmotionCandidate| c.item.emotion_distance.unwrap_or(f64::NAN);
        if self.closest_first {
            pool.sort_by(|a, b| {
                distance(a)
                    .partial_cmp(&distance(b))
                    .unwrap_or(Ordering::Equal)
            });
        } else {
            pool.sort_by(|a, b| cmp_desc(distance(a), distance(b)));
        }
        pool
    }

    /// Blends min-max scaled tag values with the pool's original rank.
    ///
    /// `score = Σ tag·weight + (1 − Σ|weight|)·rank`, highest first.
    pub fn rank_weighted(&self, pool: Vec<EmotionCandidate>) -> Vec<EmotionCandidate> {
        let n = pool.len();
        if n == 0 {
            return pool;
        }

        let tags = &self.target.specified;
        let ranges = axis_ranges(&pool, tags);
        let rank_weight = 1.0 - self.target.values.iter().map(|w| w.abs()).sum::<f64>();

        let mut scored: Vec<(f64, EmotionCandidate)> = pool
            .into_iter()
            .enumerate()
            .map(|(position, candidate)| {
                // first item holds the highest original rank
                let rank = min_max((n - position) as f64, 1.0, n as f64);
                let tag_score: f64 = candidate
                    .features(tags)
                    .iter()
                    .zip(ranges.iter())
                    .zip(self.target.values.iter())
                    .map(|((value, (min, max)), weight)| min_max(*value, *min, *max) * weight)
                    .sum();
                (tag_score + rank_weight * rank, candidate)
            })
            .collect();

        scored.sort_by(|a, b| cmp_desc(a.0, b.0));
        scored.into_iter().map(|(_, candidate)| candidate).collect()
    }
}

/// Per-tag (min, max) over the pool
fn axis_ranges(pool: &[EmotionCandidate], tags: &[EmotionTag]) -> Vec<(f64, f64)> {
    tags.iter()
        .map(|tag| {
            pool.iter()
                .map(|c| c.profile[tag.index()])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                })
        })
        .collect()
}

/// Scales into [0, 1]; a constant column maps to 0
fn min_max(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        (value - min) / (max - min)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmotionLevel, EmotionTarget};
    use std::collections::BTreeMap;

    fn candidate(item_id: u64, profile: EmotionVector) -> EmotionCandidate {
        EmotionCandidate {
            item: ScoredItem {
                item_id,
                raw_score: 1.0,
                discounted_score: 1.0,
                popularity_count: 1,
                popularity_rank: 1,
                emotion_distance: None,
                ensemble_std: None,
            },
            profile,
        }
    }

    fn with_joy(item_id: u64, joy: f64, noise: f64) -> EmotionCandidate {
        let mut profile = [noise; 8];
        profile[EmotionTag::Joy.index()] = joy;
        candidate(item_id, profile)
    }

    fn joy_high() -> NormalizedEmotionTarget {
        let mut levels = BTreeMap::new();
        for tag in EmotionTag::ALL {
            levels.insert(tag, EmotionLevel::Ignore);
        }
        levels.insert(EmotionTag::Joy, EmotionLevel::High);
        EmotionTarget::Discrete(levels).normalize(0.3, 0.8)
    }

    fn ids(pool: &[EmotionCandidate]) -> Vec<u64> {
        pool.iter().map(|c| c.item.item_id).collect()
    }

    #[test]
    fn test_single_tag_ranking_uses_joy_axis_only() {
        let target = joy_high();
        let pool = vec![
            with_joy(1, 0.1, 0.8),
            with_joy(2, 0.5, 0.0),
            with_joy(3, 0.5, 0.9),
            with_joy(4, 0.8, 0.3),
        ];

        let tuner = EmotionTuner::new(&target, DistanceMetric::Euclidean, true, false);
        let ranked = tuner.rank_by_distance(pool);

        // 2 and 3 differ only on ignored axes and keep their input order
        assert_eq!(ids(&ranked), vec![4, 2, 3, 1]);
        assert!((ranked[0].item.emotion_distance.unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_most_different_first() {
        let target = joy_high();
        let pool = vec![with_joy(1, 0.8, 0.0), with_joy(2, 0.0, 0.0), with_joy(3, 0.5, 0.0)];

        let tuner = EmotionTuner::new(&target, DistanceMetric::SqrtCityBlock, false, false);
        assert_eq!(ids(&tuner.rank_by_distance(pool)), vec![2, 3, 1]);
    }

    #[test]
    fn test_unspecified_target_passes_pool_through() {
        let target = EmotionTarget::Continuous(BTreeMap::new()).normalize(0.3, 0.8);
        let pool = vec![with_joy(5, 0.1, 0.0), with_joy(3, 0.9, 0.0)];

        let tuner = EmotionTuner::new(&target, DistanceMetric::Euclidean, true, false);
        let ranked = tuner.rank_by_distance(pool.clone());
        assert_eq!(ranked, pool);
    }

    #[test]
    fn test_scale_vector_rescales_target_by_pool_range() {
        let target = joy_high();
        // joy range 0.5 => scaled target 0.4
        let pool = vec![with_joy(1, 0.9, 0.0), with_joy(2, 0.4, 0.0), with_joy(3, 0.5, 0.0)];

        let tuner = EmotionTuner::new(&target, DistanceMetric::CityBlock, true, true);
        assert_eq!(ids(&tuner.rank_by_distance(pool)), vec![2, 3, 1]);
    }

    #[test]
    fn test_weighted_ranking_blends_rank_and_tags() {
        let mut weights = BTreeMap::new();
        weights.insert(EmotionTag::Joy, 0.9);
        let target = EmotionTarget::Continuous(weights).normalize(0.3, 0.8);
        let pool = vec![with_joy(1, 0.0, 0.0), with_joy(2, 0.5, 0.0), with_joy(3, 1.0, 0.0)];

        let tuner = EmotionTuner::new(&target, DistanceMetric::Euclidean, true, false);
        // scores: 1 -> 0.1, 2 -> 0.5, 3 -> 0.9
        assert_eq!(ids(&tuner.rank_weighted(pool)), vec![3, 2, 1]);
    }

    #[test]
    fn test_candidate_pool_requires_profiles() {
        let emotions = EmotionTable::from_entries(vec![(1, [0.1; 8]), (3, [0.2; 8])]).unwrap();
        let ranked: Vec<ScoredItem> = (1..=4).map(|id| candidate(id, [0.0; 8]).item).collect();

        let pool = candidate_pool(&ranked, &emotions, 3);
        assert_eq!(ids(&pool), vec![1, 3]);
        assert_eq!(pool[1].profile, [0.2; 8]);
    }
}
