use serde::{Deserialize, Serialize};

use crate::error::{RecommenderError, RecommenderResult};
use crate::models::ScoredItem;
use crate::store::{FoldIn, PopularityTable, TrainedModel};

/// How the popularity denominator is derived from the largest popularity count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenominatorRule {
    /// `10^(number of decimal digits of max)`: 100 -> 1000
    #[default]
    DigitCount,
    /// Smallest power of ten not below max, at least 10: 100 -> 100
    CeilPowerOfTen,
}

impl DenominatorRule {
    pub fn denominator(self, max_count: u64) -> f64 {
        match self {
            DenominatorRule::DigitCount => 10f64.powi(max_count.to_string().len() as i32),
            DenominatorRule::CeilPowerOfTen => {
                let mut denominator: u128 = 10;
                while denominator < u128::from(max_count) {
                    denominator *= 10;
                }
                denominator as f64
            }
        }
    }
}

/// Popularity-discounted rescoring: `raw − α·count/D`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopularityDiscounter {
    alpha: f64,
    denominator: f64,
}

impl PopularityDiscounter {
    pub fn new(alpha: f64, rule: DenominatorRule, popularity: &PopularityTable) -> Self {
        Self {
            alpha,
            denominator: rule.denominator(popularity.max_count()),
        }
    }

    pub fn denominator(&self) -> f64 {
        self.denominator
    }

    pub fn discount(&self, raw: f64, count: u64) -> f64 {
        raw - self.alpha * (count as f64 / self.denominator)
    }

    /// Pairs each fold-in score with its popularity and discounted score, in model item order
    pub fn score_items(
        &self,
        model: &TrainedModel,
        fold: &FoldIn,
        popularity: &PopularityTable,
    ) -> RecommenderResult<Vec<ScoredItem>> {
        model
            .item_ids()
            .iter()
            .zip(fold.scores.iter())
            .map(|(&item_id, &raw_score)| {
                let entry = popularity
                    .get(item_id)
                    .ok_or(RecommenderError::UnknownItem(item_id))?;
                Ok(ScoredItem {
                    item_id,
                    raw_score,
                    discounted_score: self.discount(raw_score, entry.count),
                    popularity_count: entry.count,
                    popularity_rank: entry.rank,
                    emotion_distance: None,
                    ensemble_std: None,
                })
            })
            .collect()
    }
}
