use std::{collections::HashMap, path::Path};

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{RecommenderError, RecommenderResult};
use crate::models::{ItemId, UserId};

/// Factor matrices shared by every model flavor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorArtifact {
    pub regularization: f64,
    pub item_ids: Vec<ItemId>,
    pub item_factors: Vec<Vec<f64>>,
    pub user_ids: Vec<UserId>,
    pub user_factors: Vec<Vec<f64>>,
}

/// On-disk form of a trained factor model (`model.json`, `resampled_model_{i}.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Implicit-feedback ALS; ratings act as confidence weights
    Implicit {
        weight: f64,
        #[serde(flatten)]
        factors: FactorArtifact,
    },
    /// Explicit ALS over bias-adjusted ratings
    Biased {
        global_bias: f64,
        item_biases: Vec<f64>,
        user_biases: Vec<f64>,
        #[serde(default)]
        damping: f64,
        #[serde(flatten)]
        factors: FactorArtifact,
    },
}

#[derive(Debug, Clone)]
enum Flavor {
    Implicit {
        weight: f64,
        /// `YᵀY + λI`, shared by every implicit fold-in
        gram: Array2<f64>,
    },
    Biased {
        global_bias: f64,
        item_biases: Array1<f64>,
        user_biases: Array1<f64>,
        damping: f64,
    },
}

/// Result of projecting a live user into the latent space
#[derive(Debug, Clone, PartialEq)]
pub struct FoldIn {
    /// One score per model item, in model item order
    pub scores: Array1<f64>,
    pub user_vector: Array1<f64>,
    pub user_bias: f64,
}

/// Immutable latent-factor model loaded from disk
#[derive(Debug, Clone)]
pub struct TrainedModel {
    flavor: Flavor,
    regularization: f64,
    item_ids: Vec<ItemId>,
    item_index: HashMap<ItemId, usize>,
    item_factors: Array2<f64>,
    user_ids: Vec<UserId>,
    user_factors: Array2<f64>,
}

fn to_matrix(rows: &[Vec<f64>], dims: usize, what: &str) -> RecommenderResult<Array2<f64>> {
    if let Some(bad) = rows.iter().position(|row| row.len() != dims) {
        return Err(RecommenderError::InvalidInput(format!(
            "{} row {} has {} factors, expected {}",
            what,
            bad,
            rows[bad].len(),
            dims
        )));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), dims), flat)
        .map_err(|e| RecommenderError::InvalidInput(format!("{} matrix: {}", what, e)))
}

impl TrainedModel {
    /// Reads and validates a JSON model artifact
    pub fn load(path: &Path) -> RecommenderResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> RecommenderResult<Self> {
        let factors = match &artifact {
            ModelArtifact::Implicit { factors, .. } | ModelArtifact::Biased { factors, .. } => {
                factors
            }
        };

        if factors.item_ids.len() != factors.item_factors.len() {
            return Err(RecommenderError::InvalidInput(format!(
                "{} item ids but {} item factor rows",
                factors.item_ids.len(),
                factors.item_factors.len()
            )));
        }
        if factors.user_ids.len() != factors.user_factors.len() {
            return Err(RecommenderError::InvalidInput(format!(
                "{} user ids but {} user factor rows",
                factors.user_ids.len(),
                factors.user_factors.len()
            )));
        }
        if !factors.regularization.is_finite() || factors.regularization < 0.0 {
            return Err(RecommenderError::InvalidInput(
                "regularization must be a non-negative number".to_string(),
            ));
        }

        let dims = factors.item_factors.first().map(|row| row.len()).unwrap_or(0);
        let item_factors = to_matrix(&factors.item_factors, dims, "item")?;
        let user_factors = to_matrix(&factors.user_factors, dims, "user")?;

        let mut item_index = HashMap::with_capacity(factors.item_ids.len());
        for (idx, item) in factors.item_ids.iter().enumerate() {
            if item_index.insert(*item, idx).is_some() {
                return Err(RecommenderError::InvalidInput(format!(
                    "duplicate item id {}",
                    item
                )));
            }
        }

        let flavor = match &artifact {
            ModelArtifact::Implicit { weight, .. } => {
                let gram = item_factors.t().dot(&item_factors)
                    + Array2::<f64>::eye(dims) * factors.regularization;
                Flavor::Implicit {
                    weight: *weight,
                    gram,
                }
            }
            ModelArtifact::Biased {
                global_bias,
                item_biases,
                user_biases,
                damping,
                ..
            } => {
                if item_biases.len() != factors.item_ids.len()
                    || user_biases.len() != factors.user_ids.len()
                {
                    return Err(RecommenderError::InvalidInput(
                        "bias vectors do not match the item/user indexes".to_string(),
                    ));
                }
                Flavor::Biased {
                    global_bias: *global_bias,
                    item_biases: Array1::from(item_biases.clone()),
                    user_biases: Array1::from(user_biases.clone()),
                    damping: *damping,
                }
            }
        };

        Ok(Self {
            flavor,
            regularization: factors.regularization,
            item_ids: factors.item_ids.clone(),
            item_index,
            item_factors,
            user_ids: factors.user_ids.clone(),
            user_factors,
        })
    }

    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }

    pub fn item_position(&self, item: ItemId) -> Option<usize> {
        self.item_index.get(&item).copied()
    }

    pub fn user_ids(&self) -> &[UserId] {
        &self.user_ids
    }

    /// Training-user factor matrix, one row per entry of `user_ids`
    pub fn user_factors(&self) -> &Array2<f64> {
        &self.user_factors
    }

    pub fn dims(&self) -> usize {
        self.item_factors.ncols()
    }

    /// Folds `(item position, rating)` pairs into a new user vector and scores every item.
    ///
    /// Empty input yields the zero vector (the population prior).
    pub fn fold_in(&self, rated: &[(usize, f64)]) -> RecommenderResult<FoldIn> {
        let dims = self.dims();

        let (user_vector, user_bias) = match &self.flavor {
            Flavor::Implicit { weight, gram } => {
                if rated.is_empty() {
                    (Array1::zeros(dims), 0.0)
                } else {
                    let mut system = gram.clone();
                    let mut rhs = Array1::<f64>::zeros(dims);
                    for &(idx, rating) in rated {
                        let y = self.item_factors.row(idx);
                        let confidence = weight * rating;
                        for a in 0..dims {
                            rhs[a] += (confidence + 1.0) * y[a];
                            for b in 0..dims {
                                system[[a, b]] += confidence * y[a] * y[b];
                            }
                        }
                    }
                    (solve(system, rhs)?, 0.0)
                }
            }
            Flavor::Biased {
                global_bias,
                item_biases,
                damping,
                ..
            } => {
                let residuals: Vec<f64> = rated
                    .iter()
                    .map(|&(idx, rating)| rating - global_bias - item_biases[idx])
                    .collect();
                let user_bias = if rated.is_empty() {
                    0.0
                } else {
                    residuals.iter().sum::<f64>() / (rated.len() as f64 + damping)
                };

                if rated.is_empty() {
                    (Array1::zeros(dims), user_bias)
                } else {
                    let mut system = Array2::<f64>::eye(dims) * self.regularization;
                    let mut rhs = Array1::<f64>::zeros(dims);
                    for (&(idx, _), residual) in rated.iter().zip(residuals.iter()) {
                        let y = self.item_factors.row(idx);
                        let target = residual - user_bias;
                        for a in 0..dims {
                            rhs[a] += target * y[a];
                            for b in 0..dims {
                                system[[a, b]] += y[a] * y[b];
                            }
                        }
                    }
                    (solve(system, rhs)?, user_bias)
                }
            }
        };

        let scores = self.score_vector(&user_vector, user_bias);
        if !user_bias.is_finite() || scores.iter().any(|s| !s.is_finite()) {
            return Err(RecommenderError::ModelInference(
                "fold-in produced non-finite scores".to_string(),
            ));
        }

        Ok(FoldIn {
            scores,
            user_vector,
            user_bias,
        })
    }

    /// Scores every item for the training user at `row`
    pub fn predict_for_user(&self, row: usize) -> Array1<f64> {
        let user_bias = match &self.flavor {
            Flavor::Implicit { .. } => 0.0,
            Flavor::Biased { user_biases, .. } => user_biases[row],
        };
        let vector = self.user_factors.row(row).to_owned();
        self.score_vector(&vector, user_bias)
    }

    fn score_vector(&self, user_vector: &Array1<f64>, user_bias: f64) -> Array1<f64> {
        let dot = self.item_factors.dot(user_vector);
        match &self.flavor {
            Flavor::Implicit { .. } => dot,
            Flavor::Biased {
                global_bias,
                item_biases,
                ..
            } => dot + item_biases + (global_bias + user_bias),
        }
    }
}

/// Solves the fold-in system `a · x = b`.
///
/// Fold-in systems are symmetric positive-definite, so Cholesky is tried first; LU with
/// partial pivoting covers the rest. A singular system is an inference error.
pub(crate) fn solve(a: Array2<f64>, b: Array1<f64>) -> RecommenderResult<Array1<f64>> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return Err(RecommenderError::Internal(format!(
            "cannot solve a {}x{} system against {} values",
            a.nrows(),
            a.ncols(),
            n
        )));
    }

    let matrix = DMatrix::from_fn(n, n, |row, col| a[[row, col]]);
    let rhs = DVector::from_iterator(n, b.iter().copied());

    let x = match matrix.clone().cholesky() {
        Some(cholesky) => cholesky.solve(&rhs),
        None => matrix.lu().solve(&rhs).ok_or_else(|| {
            RecommenderError::ModelInference("singular fold-in system".to_string())
        })?,
    };

    if x.iter().any(|v| !v.is_finite()) {
        return Err(RecommenderError::ModelInference(
            "fold-in system produced non-finite factors".to_string(),
        ));
    }
    Ok(Array1::from_iter(x.iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn implicit_artifact() -> ModelArtifact {
        ModelArtifact::Implicit {
            weight: 40.0,
            factors: FactorArtifact {
                regularization: 0.1,
                item_ids: vec![10, 20, 30],
                item_factors: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]],
                user_ids: vec![1, 2],
                user_factors: vec![vec![1.0, 0.0], vec![0.0, 2.0]],
            },
        }
    }

    fn biased_artifact() -> ModelArtifact {
        ModelArtifact::Biased {
            global_bias: 3.5,
            item_biases: vec![0.5, -0.5, 0.0],
            user_biases: vec![0.25, -0.25],
            damping: 5.0,
            factors: FactorArtifact {
                regularization: 0.1,
                item_ids: vec![10, 20, 30],
                item_factors: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]],
                user_ids: vec![1, 2],
                user_factors: vec![vec![1.0, 0.0], vec![0.0, 2.0]],
            },
        }
    }

    #[test]
    fn test_solve_known_system() {
        let a = array![[0.0, 2.0], [3.0, 1.0]];
        let b = array![4.0, 5.0];
        let x = solve(a, b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_symmetric_positive_definite() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let b = array![1.0, 2.0];
        let x = solve(a, b).unwrap();
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-12);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_singular_is_inference_error() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        let err = solve(a, b).unwrap_err();
        assert_eq!(err.code(), "MODEL_INFERENCE");
    }

    #[test]
    fn test_implicit_fold_in_prefers_rated_direction() {
        let model = TrainedModel::from_artifact(implicit_artifact()).unwrap();
        let fold = model.fold_in(&[(0, 5.0)]).unwrap();

        assert_eq!(fold.scores.len(), 3);
        assert!(fold.scores[0] > fold.scores[1]);
        assert!(fold.user_vector[0] > 0.0);
        assert!(fold.scores[1] < 0.0);
    }

    #[test]
    fn test_empty_fold_in_is_prior() {
        let model = TrainedModel::from_artifact(implicit_artifact()).unwrap();
        let fold = model.fold_in(&[]).unwrap();
        assert!(fold.scores.iter().all(|s| *s == 0.0));

        let biased = TrainedModel::from_artifact(biased_artifact()).unwrap();
        let fold = biased.fold_in(&[]).unwrap();
        assert_eq!(fold.scores, array![4.0, 3.0, 3.5]);
        assert_eq!(fold.user_bias, 0.0);
    }

    #[test]
    fn test_biased_fold_in_user_bias_is_damped() {
        let model = TrainedModel::from_artifact(biased_artifact()).unwrap();
        // residual = 5.0 - 3.5 - 0.5 = 1.0, damped by 1 + 5
        let fold = model.fold_in(&[(0, 5.0)]).unwrap();
        assert!((fold.user_bias - 1.0 / 6.0).abs() < 1e-12);
        assert!(fold.scores[0] > 4.0);
    }

    #[test]
    fn test_predict_for_training_user() {
        let model = TrainedModel::from_artifact(implicit_artifact()).unwrap();
        assert_eq!(model.predict_for_user(1), array![0.0, 2.0, 1.0]);

        let biased = TrainedModel::from_artifact(biased_artifact()).unwrap();
        assert_eq!(biased.predict_for_user(0), array![5.25, 3.25, 4.25]);
    }

    #[test]
    fn test_artifact_validation() {
        let mut artifact = implicit_artifact();
        if let ModelArtifact::Implicit { factors, .. } = &mut artifact {
            factors.item_factors[1] = vec![1.0];
        }
        assert!(TrainedModel::from_artifact(artifact).is_err());

        let mut artifact = implicit_artifact();
        if let ModelArtifact::Implicit { factors, .. } = &mut artifact {
            factors.item_ids = vec![10, 10, 30];
        }
        assert!(TrainedModel::from_artifact(artifact).is_err());
    }

    #[test]
    fn test_artifact_json_is_tagged() {
        let json = serde_json::to_value(implicit_artifact()).unwrap();
        assert_eq!(json["kind"], "implicit");
        assert_eq!(json["item_ids"], serde_json::json!([10, 20, 30]));

        let back: ModelArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, implicit_artifact());
    }
}
