use std::path::PathBuf;

use crate::models::ItemId;

/// Recommender-level errors
#[derive(thiserror::Error, Debug)]
pub enum RecommenderError {
    #[error("Failed to load model bundle from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    #[error("Model inference failed: {0}")]
    ModelInference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecommenderError {
    pub fn model_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModelLoad { .. } => "MODEL_LOAD",
            Self::UnknownItem(_) => "UNKNOWN_ITEM",
            Self::ModelInference(_) => "MODEL_INFERENCE",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Io(_) => "IO",
            Self::Serialization(_) => "SERIALIZATION",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Load-time failures block every request for the model path until fixed
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ModelLoad { .. })
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        })
    }
}

pub type RecommenderResult<T> = Result<T, RecommenderError>;
