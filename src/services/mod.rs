pub mod discount;
pub mod distance;
pub mod diversifier;
pub mod emotion_tuner;
pub mod ensemble;
pub mod neighbors;
pub mod predictor;
pub mod ranking;
pub mod visualization;

pub use discount::{DenominatorRule, PopularityDiscounter};
pub use distance::DistanceMetric;
pub use diversifier::{Diversifier, Selection};
pub use emotion_tuner::{candidate_pool, EmotionCandidate, EmotionTuner};
pub use ensemble::EnsembleUncertaintyEstimator;
pub use neighbors::{find_neighbors, Neighbor, NeighborFinder, NeighborMetric};
pub use predictor::FoldInPredictor;
pub use ranking::RankingEngine;
pub use visualization::{global_community_scores, viz_candidates, ClusterVisualizer, VizCandidate};
