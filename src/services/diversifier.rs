use crate::error::{RecommenderError, RecommenderResult};
use crate::models::{DiversityOptions, ItemId};
use crate::services::{distance::sqrt_city_block, DistanceMetric};

/// Items chosen by the diversifier, in selection order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    /// Positions in the input pool
    pub indices: Vec<usize>,
    pub items: Vec<ItemId>,
    /// Feature vectors as used for selection (after weighting)
    pub vectors: Vec<Vec<f64>>,
}

/// Greedy max-dispersion selection.
///
/// Seeds with the candidate closest to the pool centroid (sqrt-city-block), then
/// repeatedly adds the remaining candidate whose summed distance to the selected
/// set is largest. Ties go to the earlier candidate in the pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diversifier {
    metric: DistanceMetric,
    weight_sigma: Option<f64>,
}

impl Diversifier {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            weight_sigma: None,
        }
    }

    /// Scales every feature by `sigma` before distances are measured
    pub fn with_weighting(mut self, sigma: f64) -> Self {
        self.weight_sigma = Some(sigma);
        self
    }

    pub fn from_options(options: &DiversityOptions) -> Self {
        let diversifier = Self::new(options.metric);
        match (options.weighting, options.weight_sigma) {
            (true, Some(sigma)) => diversifier.with_weighting(sigma),
            _ => diversifier,
        }
    }

    pub fn select(
        &self,
        items: &[ItemId],
        vectors: &[Vec<f64>],
        k: usize,
    ) -> RecommenderResult<Selection> {
        if items.len() != vectors.len() {
            return Err(RecommenderError::InvalidInput(format!(
                "{} pool items but {} feature vectors",
                items.len(),
                vectors.len()
            )));
        }
        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        if vectors.iter().any(|v| v.len() != dims) {
            return Err(RecommenderError::InvalidInput(
                "feature vectors have mixed dimensions".to_string(),
            ));
        }

        let target = k.min(items.len());
        if target == 0 {
            return Ok(Selection::default());
        }

        let features: Vec<Vec<f64>> = match self.weight_sigma {
            Some(sigma) => vectors
                .iter()
                .map(|v| v.iter().map(|x| x * sigma).collect())
                .collect(),
            None => vectors.to_vec(),
        };

        let centroid = centroid(&features, dims);
        let mut seed = 0;
        let mut seed_distance = f64::INFINITY;
        for (i, vector) in features.iter().enumerate() {
            let d = sqrt_city_block(vector, &centroid);
            if d < seed_distance {
                seed = i;
                seed_distance = d;
            }
        }

        let mut selected = vec![false; features.len()];
        let mut order = Vec::with_capacity(target);
        // summed distance from each candidate to everything selected so far
        let mut sums = vec![0.0; features.len()];

        let mut last = seed;
        selected[last] = true;
        order.push(last);

        while order.len() < target {
            let mut best: Option<usize> = None;
            for i in 0..features.len() {
                if selected[i] {
                    continue;
                }
                sums[i] += self.metric.distance(&features[i], &features[last]);
                match best {
                    Some(b) if sums[i] <= sums[b] => {}
                    _ => best = Some(i),
                }
            }

            match best {
                Some(next) => {
                    selected[next] = true;
                    order.push(next);
                    last = next;
                }
                None => break,
            }
        }

        tracing::debug!(pool = items.len(), selected = order.len(), "Diversified pool");

        Ok(Selection {
            items: order.iter().map(|&i| items[i]).collect(),
            vectors: order.iter().map(|&i| features[i].clone()).collect(),
            indices: order,
        })
    }
}

fn centroid(vectors: &[Vec<f64>], dims: usize) -> Vec<f64> {
    let mut centroid = vec![0.0; dims];
    for vector in vectors {
        for (c, x) in centroid.iter_mut().zip(vector.iter()) {
            *c += x;
        }
    }
    let n = vectors.len().max(1) as f64;
    centroid.iter_mut().for_each(|c| *c /= n);
    centroid
}
