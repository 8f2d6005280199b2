use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, HashSet},
};

use ndarray::{Array1, Array2};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::models::{AdvisorProfile, ItemId, UserId};
use crate::services::distance::{cosine_distance, euclidean};
use crate::services::ranking::cmp_desc;
use crate::store::TrainedModel;

/// Latent-space distance used for neighbor search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborMetric {
    #[default]
    Cosine,
    Euclidean,
}

impl NeighborMetric {
    pub fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            NeighborMetric::Cosine => cosine_distance(a, b),
            NeighborMetric::Euclidean => euclidean(a, b),
        }
    }
}

/// A training user close to the live user
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub user_id: UserId,
    /// Row in the model's user factor matrix
    pub row: usize,
    pub distance: f64,
}

/// The `k` training users closest to `live`, ascending by distance.
///
/// `k` is clipped to the training population; equal distances keep matrix order.
pub fn find_neighbors(
    user_matrix: &Array2<f64>,
    user_ids: &[UserId],
    live: &Array1<f64>,
    metric: NeighborMetric,
    k: usize,
) -> Vec<Neighbor> {
    let live = live.to_vec();
    let mut neighbors: Vec<Neighbor> = user_matrix
        .rows()
        .into_iter()
        .zip(user_ids.iter())
        .enumerate()
        .map(|(row, (factors, &user_id))| Neighbor {
            user_id,
            row,
            distance: metric.distance(&factors.to_vec(), &live),
        })
        .collect();

    neighbors.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    neighbors.truncate(k);
    neighbors
}

/// Per-neighbor predictions over a model's training users
pub struct NeighborFinder<'a> {
    model: &'a TrainedModel,
}

impl<'a> NeighborFinder<'a> {
    pub fn new(model: &'a TrainedModel) -> Self {
        Self { model }
    }

    pub fn find(&self, live: &Array1<f64>, metric: NeighborMetric, k: usize) -> Vec<Neighbor> {
        find_neighbors(
            self.model.user_factors(),
            self.model.user_ids(),
            live,
            metric,
            k,
        )
    }

    fn neighbor_predictions(&self, neighbors: &[Neighbor]) -> Vec<Array1<f64>> {
        neighbors
            .iter()
            .map(|n| self.model.predict_for_user(n.row))
            .collect()
    }

    /// Population variance of each item's predicted score across the neighbors
    pub fn controversy_scores(&self, neighbors: &[Neighbor]) -> HashMap<ItemId, f64> {
        let items = self.model.item_ids();
        if neighbors.is_empty() {
            return items.iter().map(|&item| (item, 0.0)).collect();
        }

        let predictions = self.neighbor_predictions(neighbors);
        let count = predictions.len() as f64;

        items
            .iter()
            .enumerate()
            .map(|(idx, &item)| {
                let mean = predictions.iter().map(|p| p[idx]).sum::<f64>() / count;
                let variance = predictions
                    .iter()
                    .map(|p| (p[idx] - mean) * (p[idx] - mean))
                    .sum::<f64>()
                    / count;
                (item, variance)
            })
            .collect()
    }

    /// Mean predicted score of each item across the neighbors; empty without neighbors
    pub fn neighborhood_average(&self, neighbors: &[Neighbor]) -> HashMap<ItemId, f64> {
        if neighbors.is_empty() {
            return HashMap::new();
        }

        let predictions = self.neighbor_predictions(neighbors);
        let count = predictions.len() as f64;

        self.model
            .item_ids()
            .iter()
            .enumerate()
            .map(|(idx, &item)| (item, predictions.iter().map(|p| p[idx]).sum::<f64>() / count))
            .collect()
    }

    /// One advisor per neighbor: a uniformly sampled pick from its top `pool_size`
    /// unrated predictions plus its top `num_rec` as a profile
    pub fn advisor_profiles<R: Rng>(
        &self,
        neighbors: &[Neighbor],
        rated: &HashSet<ItemId>,
        pool_size: usize,
        num_rec: usize,
        rng: &mut R,
    ) -> BTreeMap<UserId, AdvisorProfile> {
        let items = self.model.item_ids();

        neighbors
            .iter()
            .map(|neighbor| {
                let predictions = self.model.predict_for_user(neighbor.row);
                let mut ranked: Vec<(ItemId, f64)> = items
                    .iter()
                    .copied()
                    .zip(predictions.iter().copied())
                    .filter(|(item, _)| !rated.contains(item))
                    .collect();
                ranked.sort_by(|a, b| cmp_desc(a.1, b.1));

                let pool = &ranked[..pool_size.min(ranked.len())];
                let recommendation = pool.choose(rng).map(|(item, _)| *item);
                let profile_top = ranked.iter().take(num_rec).map(|(item, _)| *item).collect();

                (
                    neighbor.user_id,
                    AdvisorProfile {
                        id: neighbor.user_id,
                        recommendation,
                        profile_top,
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FactorArtifact, ModelArtifact};
    use ndarray::array;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn model(user_factors: Vec<Vec<f64>>) -> TrainedModel {
        let user_ids = (1..=user_factors.len() as u64).collect();
        TrainedModel::from_artifact(ModelArtifact::Implicit {
            weight: 1.0,
            factors: FactorArtifact {
                regularization: 0.1,
                item_ids: vec![10, 20, 30],
                item_factors: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
                user_ids,
                user_factors,
            },
        })
        .unwrap()
    }

    #[test]
    fn test_neighbors_sorted_and_clipped() {
        let matrix = array![[1.0, 0.0], [0.0, 1.0], [0.9, 0.1], [-1.0, 0.0]];
        let ids = vec![11, 12, 13, 14];
        let live = array![1.0, 0.0];

        let neighbors = find_neighbors(&matrix, &ids, &live, NeighborMetric::Cosine, 2);
        let found: Vec<UserId> = neighbors.iter().map(|n| n.user_id).collect();
        assert_eq!(found, vec![11, 13]);

        let all = find_neighbors(&matrix, &ids, &live, NeighborMetric::Euclidean, 99);
        assert_eq!(all.len(), 4);
        assert_eq!(all.last().unwrap().user_id, 14);
    }

    #[test]
    fn test_controversy_variance() {
        // item 10 predicted [1, 1, 1]; item 20 predicted [0, 1, 2]
        let model = model(vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 2.0]]);
        let neighbors: Vec<Neighbor> = (0..3)
            .map(|row| Neighbor {
                user_id: row as u64 + 1,
                row,
                distance: 0.0,
            })
            .collect();

        let scores = NeighborFinder::new(&model).controversy_scores(&neighbors);
        assert_eq!(scores[&10], 0.0);
        assert!((scores[&20] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_neighborhood_average() {
        // per neighbor, item 10 scores 1, item 20 scores 0..2, item 30 scores 1..3
        let model = model(vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 2.0]]);
        let finder = NeighborFinder::new(&model);
        let neighbors = finder.find(&array![1.0, 1.0], NeighborMetric::Euclidean, 3);

        let averages = finder.neighborhood_average(&neighbors);
        assert_eq!(averages[&10], 1.0);
        assert_eq!(averages[&20], 1.0);
        assert_eq!(averages[&30], 2.0);

        assert!(finder.neighborhood_average(&[]).is_empty());
    }

    #[test]
    fn test_advisor_profiles_exclude_rated() {
        let model = model(vec![vec![1.0, 0.2], vec![0.1, 1.0]]);
        let neighbors = NeighborFinder::new(&model).find(&array![1.0, 0.0], NeighborMetric::Cosine, 2);
        let rated: HashSet<ItemId> = [30].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(7);

        let advisors =
            NeighborFinder::new(&model).advisor_profiles(&neighbors, &rated, 200, 1, &mut rng);

        assert_eq!(advisors.len(), 2);
        let first = &advisors[&1];
        assert_eq!(first.profile_top, vec![10]);
        assert!(matches!(first.recommendation, Some(10) | Some(20)));
        assert_eq!(advisors[&2].profile_top, vec![20]);
    }

    #[test]
    fn test_advisor_without_candidates() {
        let model = model(vec![vec![1.0, 0.0]]);
        let neighbors = NeighborFinder::new(&model).find(&array![1.0, 0.0], NeighborMetric::Cosine, 1);
        let rated: HashSet<ItemId> = [10, 20, 30].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(1);

        let advisors =
            NeighborFinder::new(&model).advisor_profiles(&neighbors, &rated, 200, 5, &mut rng);
        assert_eq!(advisors[&1].recommendation, None);
        assert!(advisors[&1].profile_top.is_empty());
    }

    proptest! {
        #[test]
        fn prop_neighbor_count_and_order(
            rows in proptest::collection::vec(proptest::collection::vec(-1.0f64..1.0, 2), 0..25),
            k in 0usize..40,
        ) {
            let flat: Vec<f64> = rows.iter().flatten().copied().collect();
            let matrix = Array2::from_shape_vec((rows.len(), 2), flat).unwrap();
            let ids: Vec<UserId> = (0..rows.len() as u64).collect();
            let live = array![0.3, -0.2];

            let neighbors = find_neighbors(&matrix, &ids, &live, NeighborMetric::Euclidean, k);
            prop_assert_eq!(neighbors.len(), k.min(rows.len()));
            let unique: HashSet<UserId> = neighbors.iter().map(|n| n.user_id).collect();
            prop_assert_eq!(unique.len(), neighbors.len());
            prop_assert!(neighbors.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }
}
