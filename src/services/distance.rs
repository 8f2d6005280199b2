use serde::{Deserialize, Serialize};

/// Distances used for emotion matching and diversification sums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Euclidean,
    #[serde(alias = "cityblock")]
    CityBlock,
    #[serde(alias = "sqrtcityblock", alias = "sqrt_cityblock")]
    SqrtCityBlock,
}

impl DistanceMetric {
    pub fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            DistanceMetric::Euclidean => euclidean(a, b),
            DistanceMetric::CityBlock => city_block(a, b),
            DistanceMetric::SqrtCityBlock => sqrt_city_block(a, b),
        }
    }
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

pub fn city_block(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// City-block distance with a square root taken per axis: `Σ sqrt(|a_i − b_i|)`
pub fn sqrt_city_block(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs().sqrt()).sum()
}

/// Cosine similarity; zero when either vector has zero norm
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_on_known_points() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert_eq!(euclidean(&a, &b), 5.0);
        assert_eq!(city_block(&a, &b), 7.0);
        assert!((sqrt_city_block(&a, &b) - (3f64.sqrt() + 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_metric_dispatch() {
        let a = [1.0, 1.0, 0.0];
        let b = [0.0, 1.0, 1.0];
        assert_eq!(DistanceMetric::CityBlock.distance(&a, &b), 2.0);
        assert_eq!(DistanceMetric::SqrtCityBlock.distance(&a, &b), 2.0);
        assert!((DistanceMetric::Euclidean.distance(&a, &b) - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_handles_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 2.0]), 1.0);
        assert!(cosine_distance(&[1.0, 2.0], &[2.0, 4.0]).abs() < 1e-12);
    }

    #[test]
    fn test_metric_aliases() {
        let m: DistanceMetric = serde_json::from_str("\"sqrtcityblock\"").unwrap();
        assert_eq!(m, DistanceMetric::SqrtCityBlock);
        let m: DistanceMetric = serde_json::from_str("\"city_block\"").unwrap();
        assert_eq!(m, DistanceMetric::CityBlock);
    }
}
