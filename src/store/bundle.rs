use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};

use super::{AverageScoreTable, EmotionTable, PopularityTable, TrainedModel};
use crate::error::{RecommenderError, RecommenderResult};
use crate::models::ItemId;

pub const MODEL_FILE: &str = "model.json";
pub const POPULARITY_FILE: &str = "item_popularity.csv";
pub const AVERAGE_SCORE_FILE: &str = "averaged_item_score.csv";
pub const EMOTION_FILE: &str = "item_emotions.csv";

pub fn resampled_model_file(index: usize) -> String {
    format!("resampled_model_{}.json", index)
}

/// Everything loaded from one model directory, shared read-only by every request
#[derive(Debug)]
pub struct ModelBundle {
    pub path: PathBuf,
    pub model: TrainedModel,
    pub popularity: PopularityTable,
    pub averages: AverageScoreTable,
    pub emotions: Option<EmotionTable>,
    /// Bootstrap-resampled models for uncertainty estimates
    pub ensemble: Vec<TrainedModel>,
    pub loaded_at: DateTime<Utc>,
}

impl ModelBundle {
    /// Assembles a bundle and checks that every table covers the model's item index.
    ///
    /// Popularity and average scores must match the model item set exactly; emotion
    /// profiles and resampled models may cover a subset, but never unknown items.
    pub fn new(
        path: impl Into<PathBuf>,
        model: TrainedModel,
        popularity: PopularityTable,
        averages: AverageScoreTable,
        emotions: Option<EmotionTable>,
        ensemble: Vec<TrainedModel>,
    ) -> RecommenderResult<Self> {
        let path = path.into();
        let items: HashSet<ItemId> = model.item_ids().iter().copied().collect();

        let fail = |reason: String| RecommenderError::model_load(path.clone(), reason);

        check_exact(&items, popularity.item_ids(), POPULARITY_FILE).map_err(fail)?;
        check_exact(&items, averages.item_ids(), AVERAGE_SCORE_FILE).map_err(fail)?;
        if let Some(emotions) = &emotions {
            check_subset(&items, emotions.item_ids(), EMOTION_FILE).map_err(fail)?;
        }
        for (i, resampled) in ensemble.iter().enumerate() {
            check_subset(&items, resampled.item_ids().iter(), &resampled_model_file(i + 1))
                .map_err(fail)?;
        }

        Ok(Self {
            path,
            model,
            popularity,
            averages,
            emotions,
            ensemble,
            loaded_at: Utc::now(),
        })
    }

    /// Reads every artifact from `dir`; `item_emotions.csv` is optional
    pub fn load(dir: &Path, ensemble_size: usize) -> RecommenderResult<Self> {
        let wrap = |file: &str, e: RecommenderError| {
            RecommenderError::model_load(dir.join(file), e.to_string())
        };

        let model = TrainedModel::load(&dir.join(MODEL_FILE)).map_err(|e| wrap(MODEL_FILE, e))?;
        let popularity = PopularityTable::load(&dir.join(POPULARITY_FILE))
            .map_err(|e| wrap(POPULARITY_FILE, e))?;
        let averages = AverageScoreTable::load(&dir.join(AVERAGE_SCORE_FILE))
            .map_err(|e| wrap(AVERAGE_SCORE_FILE, e))?;

        let emotion_path = dir.join(EMOTION_FILE);
        let emotions = if emotion_path.exists() {
            Some(EmotionTable::load(&emotion_path).map_err(|e| wrap(EMOTION_FILE, e))?)
        } else {
            None
        };

        let mut ensemble = Vec::with_capacity(ensemble_size);
        for i in 1..=ensemble_size {
            let file = resampled_model_file(i);
            ensemble.push(TrainedModel::load(&dir.join(&file)).map_err(|e| wrap(&file, e))?);
        }

        let bundle = Self::new(dir, model, popularity, averages, emotions, ensemble)?;
        tracing::info!(
            path = %dir.display(),
            items = bundle.model.item_ids().len(),
            users = bundle.model.user_ids().len(),
            ensemble = bundle.ensemble.len(),
            emotions = bundle.emotions.is_some(),
            loaded_at = %bundle.loaded_at.to_rfc3339(),
            "Model bundle loaded"
        );
        Ok(bundle)
    }

    pub fn emotions(&self) -> RecommenderResult<&EmotionTable> {
        self.emotions.as_ref().ok_or_else(|| {
            RecommenderError::InvalidInput(format!(
                "model at {} has no emotion profiles",
                self.path.display()
            ))
        })
    }
}

fn check_exact<'a>(
    items: &HashSet<ItemId>,
    table: impl Iterator<Item = &'a ItemId>,
    name: &str,
) -> Result<(), String> {
    let table: HashSet<ItemId> = table.copied().collect();
    if let Some(extra) = table.difference(items).next() {
        return Err(format!("{} references unknown item {}", name, extra));
    }
    if let Some(missing) = items.difference(&table).next() {
        return Err(format!("{} has no entry for item {}", name, missing));
    }
    Ok(())
}

fn check_subset<'a>(
    items: &HashSet<ItemId>,
    mut table: impl Iterator<Item = &'a ItemId>,
    name: &str,
) -> Result<(), String> {
    match table.find(|item| !items.contains(item)) {
        Some(extra) => Err(format!("{} references unknown item {}", name, extra)),
        None => Ok(()),
    }
}
