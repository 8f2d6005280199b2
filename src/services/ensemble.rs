use std::collections::HashMap;

use crate::error::RecommenderResult;
use crate::models::{ItemId, LiveUserRatings};
use crate::services::FoldInPredictor;
use crate::store::TrainedModel;

/// NaN-aware sample standard deviation (n − 1); `None` with fewer than two observations
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.len() < 2 {
        return None;
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Uncertainty of a live user's scores across bootstrap-resampled models
pub struct EnsembleUncertaintyEstimator<'a> {
    ensemble: &'a [TrainedModel],
}

impl<'a> EnsembleUncertaintyEstimator<'a> {
    pub fn new(ensemble: &'a [TrainedModel]) -> Self {
        Self { ensemble }
    }

    /// Per-item score spread across the resampled models.
    ///
    /// Each model scores only the items in its own index, and ratings of items a
    /// resample never saw are left out of its fold-in.
    pub fn item_std(&self, ratings: &LiveUserRatings) -> RecommenderResult<HashMap<ItemId, f64>> {
        let mut observations: HashMap<ItemId, Vec<f64>> = HashMap::new();

        for (i, model) in self.ensemble.iter().enumerate() {
            let fold = FoldInPredictor::new(model).predict_known(ratings)?;
            for (&item, &score) in model.item_ids().iter().zip(fold.scores.iter()) {
                observations.entry(item).or_default().push(score);
            }
            tracing::trace!(model = i + 1, items = model.item_ids().len(), "Scored resample");
        }

        Ok(observations
            .into_iter()
            .filter_map(|(item, scores)| sample_std(&scores).map(|std| (item, std)))
            .collect())
    }
}
