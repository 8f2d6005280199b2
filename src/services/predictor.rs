use crate::error::{RecommenderError, RecommenderResult};
use crate::models::LiveUserRatings;
use crate::store::{FoldIn, TrainedModel};

/// Cold-start scoring of a live user against a trained model
pub struct FoldInPredictor<'a> {
    model: &'a TrainedModel,
}

impl<'a> FoldInPredictor<'a> {
    pub fn new(model: &'a TrainedModel) -> Self {
        Self { model }
    }

    /// Folds the ratings into the model and scores every item.
    ///
    /// Every rated item must be known to the model; the request is rejected before any
    /// computation otherwise.
    pub fn predict(&self, user_id: &str, ratings: &LiveUserRatings) -> RecommenderResult<FoldIn> {
        let mut rated = Vec::with_capacity(ratings.len());
        for rating in ratings.iter() {
            let position = self
                .model
                .item_position(rating.item_id)
                .ok_or(RecommenderError::UnknownItem(rating.item_id))?;
            rated.push((position, checked_rating(rating.rating)?));
        }

        tracing::debug!(user_id, rated = rated.len(), "Folding in live user");
        self.model.fold_in(&rated)
    }

    /// Like `predict`, but silently skips items the model does not know.
    ///
    /// Used for bootstrap resamples, whose item sets may be subsets of the main model's.
    pub fn predict_known(&self, ratings: &LiveUserRatings) -> RecommenderResult<FoldIn> {
        let mut rated = Vec::with_capacity(ratings.len());
        for rating in ratings.iter() {
            if let Some(position) = self.model.item_position(rating.item_id) {
                rated.push((position, checked_rating(rating.rating)?));
            }
        }
        self.model.fold_in(&rated)
    }
}

fn checked_rating(rating: f64) -> RecommenderResult<f64> {
    if rating.is_finite() {
        Ok(rating)
    } else {
        Err(RecommenderError::InvalidInput(format!(
            "rating must be a finite number, got {}",
            rating
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;
    use crate::store::{FactorArtifact, ModelArtifact};

    fn model() -> TrainedModel {
        TrainedModel::from_artifact(ModelArtifact::Implicit {
            weight: 10.0,
            factors: FactorArtifact {
                regularization: 0.5,
                item_ids: vec![100, 200, 300],
                item_factors: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
                user_ids: vec![1],
                user_factors: vec![vec![0.5, 0.5]],
            },
        })
        .unwrap()
    }

    #[test]
    fn test_unknown_item_is_rejected() {
        let model = model();
        let ratings = LiveUserRatings::new(vec![Rating::new(100, 4.0), Rating::new(999, 3.0)]);
        let err = FoldInPredictor::new(&model)
            .predict("p", &ratings)
            .unwrap_err();
        assert!(matches!(err, RecommenderError::UnknownItem(999)));
    }

    #[test]
    fn test_known_items_only_skips_unknown() {
        let model = model();
        let predictor = FoldInPredictor::new(&model);
        let with_unknown = LiveUserRatings::new(vec![Rating::new(100, 4.0), Rating::new(999, 3.0)]);
        let without = LiveUserRatings::new(vec![Rating::new(100, 4.0)]);

        let a = predictor.predict_known(&with_unknown).unwrap();
        let b = predictor.predict("p", &without).unwrap();
        assert_eq!(a.scores, b.scores);
    }

    #[test]
    fn test_empty_ratings_are_valid() {
        let model = model();
        let fold = FoldInPredictor::new(&model)
            .predict("p", &LiveUserRatings::default())
            .unwrap();
        assert_eq!(fold.scores.len(), 3);
    }

    #[test]
    fn test_non_finite_rating_is_invalid() {
        let model = model();
        let ratings = LiveUserRatings::new(vec![Rating::new(100, f64::NAN)]);
        let err = FoldInPredictor::new(&model).predict("p", &ratings).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }
}
