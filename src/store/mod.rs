pub mod bundle;
pub mod cache;
pub mod model;
pub mod model_store;
pub mod tables;

mod macros;

pub use bundle::ModelBundle;
pub use cache::{CacheKey, ResponseCache};
pub use model::{FactorArtifact, FoldIn, ModelArtifact, TrainedModel};
pub use model_store::{BundleLoader, FsBundleLoader, ModelStore};
pub use tables::{AverageScoreTable, EmotionTable, PopularityTable};
