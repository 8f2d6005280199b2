use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use crate::models::{ItemId, ScoredItem};
use crate::store::AverageScoreTable;

/// Descending order with NaN (and missing values) last
pub(crate) fn cmp_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Ranked list flavors over a live user's scored items.
///
/// Every list excludes rated items, clips to the available candidates and keeps the
/// original item order among ties.
pub struct RankingEngine<'a> {
    items: &'a [ScoredItem],
    rated: &'a HashSet<ItemId>,
}

impl<'a> RankingEngine<'a> {
    pub fn new(items: &'a [ScoredItem], rated: &'a HashSet<ItemId>) -> Self {
        Self { items, rated }
    }

    fn candidates(&self) -> Vec<ScoredItem> {
        self.items
            .iter()
            .filter(|item| !self.rated.contains(&item.item_id))
            .cloned()
            .collect()
    }

    fn ranked_by<F>(&self, key: F) -> Vec<ScoredItem>
    where
        F: Fn(&ScoredItem) -> f64,
    {
        let mut candidates = self.candidates();
        candidates.sort_by(|a, b| cmp_desc(key(a), key(b)));
        candidates
    }

    /// All unrated items by descending discounted score
    pub fn by_discounted_score(&self) -> Vec<ScoredItem> {
        self.ranked_by(|item| item.discounted_score)
    }

    pub fn top_n(&self, num_rec: usize) -> Vec<ScoredItem> {
        let mut ranked = self.by_discounted_score();
        ranked.truncate(num_rec);
        ranked
    }

    /// Items the live user likes least relative to the average user
    pub fn hate_items(&self, averages: &AverageScoreTable, num_rec: usize) -> Vec<ScoredItem> {
        let mut ranked = self.ranked_by(|item| match averages.get(item.item_id) {
            Some(average) => average.ave_discounted_score - item.discounted_score,
            None => f64::NAN,
        });
        ranked.truncate(num_rec);
        ranked
    }

    /// Good-for-you but obscure: the top `pool_size` by discounted score, least popular first
    pub fn hip_items(&self, pool_size: usize, num_rec: usize) -> Vec<ScoredItem> {
        let mut pool = self.by_discounted_score();
        pool.truncate(pool_size);
        pool.sort_by_key(|item| item.popularity_count);
        pool.truncate(num_rec);
        pool
    }

    /// Items with the widest spread across resampled models; items without a spread go last
    pub fn no_clue_items(&self, stds: &HashMap<ItemId, f64>, num_rec: usize) -> Vec<ScoredItem> {
        let mut ranked = self.ranked_by(|item| stds.get(&item.item_id).copied().unwrap_or(f64::NAN));
        ranked.truncate(num_rec);
        for item in ranked.iter_mut() {
            item.ensemble_std = stds.get(&item.item_id).copied();
        }
        ranked
    }

    /// Items whose predicted score varies most among the live user's neighbors
    pub fn controversial_items(
        &self,
        variances: &HashMap<ItemId, f64>,
        num_rec: usize,
    ) -> Vec<ScoredItem> {
        let mut ranked =
            self.ranked_by(|item| variances.get(&item.item_id).copied().unwrap_or(f64::NAN));
        ranked.truncate(num_rec);
        ranked
    }
}

pub fn item_ids(items: &[ScoredItem]) -> Vec<ItemId> {
    items.iter().map(|item| item.item_id).collect()
}
