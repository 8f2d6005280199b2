//! Recommendation core for the rating-based study system: fold-in prediction over
//! pretrained factor models, popularity discounting, and the condition-specific
//! rankings (emotion tuning, diversification, neighbors, uncertainty, visualization).

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod telemetry;

pub use api::{recommend, recommend_from, RecommenderState, RequestId};
pub use config::Config;
pub use error::{RecommenderError, RecommenderResult};
pub use models::{
    Condition, LiveUserRatings, Rating, RecommendationRequest, RecommendationResponse,
};
