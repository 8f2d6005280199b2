use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, SeedableRng};
use tracing::Instrument;

use crate::config::Config;
use crate::error::{RecommenderError, RecommenderResult};
use crate::models::{
    CommunitySource, Condition, DiversityCriterion, DiversityOptions, EmotionTag, EmotionTuning,
    ItemId, RecommendationRequest, RecommendationResponse, ScoredItem, VizOptions,
};
use crate::services::{
    candidate_pool, global_community_scores, ranking::item_ids, viz_candidates,
    ClusterVisualizer, Diversifier, EmotionCandidate, EmotionTuner, EnsembleUncertaintyEstimator,
    FoldInPredictor, NeighborFinder, PopularityDiscounter, RankingEngine,
};
use crate::store::{CacheKey, FoldIn, ModelBundle};

use super::{make_span_with_request_id, RecommenderState, RequestId};

/// Loads the configured model bundle up front so a broken model fails at startup
pub async fn preload(state: &RecommenderState) -> RecommenderResult<()> {
    let store = state.store.clone();
    let path = state.config.model_dir.clone();
    tokio::task::spawn_blocking(move || store.get(&path).map(|_| ()))
        .await
        .map_err(|e| RecommenderError::Internal(format!("model preload task failed: {}", e)))?
}

/// Computes a recommendation against the configured model directory
pub async fn recommend(
    state: &RecommenderState,
    request_id: RequestId,
    request: RecommendationRequest,
) -> RecommenderResult<RecommendationResponse> {
    let model_path = state.config.model_dir.clone();
    recommend_from(state, request_id, &model_path, request).await
}

/// Computes a recommendation against an explicit model directory, caching the response
pub async fn recommend_from(
    state: &RecommenderState,
    request_id: RequestId,
    model_path: &Path,
    request: RecommendationRequest,
) -> RecommenderResult<RecommendationResponse> {
    let span = make_span_with_request_id(&request_id, request.condition.name());

    async move {
        let key = CacheKey::for_request(model_path, &request)?;
        let store = state.store.clone();
        let config = state.config.clone();
        let path: PathBuf = model_path.to_path_buf();
        let span = tracing::Span::current();

        let result = crate::cached!(state.cache, key, async move {
            tokio::task::spawn_blocking(move || {
                let _entered = span.enter();
                let bundle = store.get(&path)?;
                dispatch(&bundle, &config, &request)
            })
            .await
            .map_err(|e| RecommenderError::Internal(format!("recommendation task failed: {}", e)))?
        });

        if let Err(e) = &result {
            tracing::warn!(code = e.code(), error = %e, "Recommendation failed");
        }
        result
    }
    .instrument(span)
    .await
}

/// Runs one request against a loaded bundle; the single dispatch point over conditions
pub fn dispatch(
    bundle: &ModelBundle,
    config: &Config,
    request: &RecommendationRequest,
) -> RecommenderResult<RecommendationResponse> {
    let num_rec = request.num_rec;
    let fold = FoldInPredictor::new(&bundle.model).predict(&request.user_id, &request.ratings)?;
    let discounter = PopularityDiscounter::new(
        config.discount_coefficient,
        config.denominator_rule,
        &bundle.popularity,
    );
    let scored = discounter.score_items(&bundle.model, &fold, &bundle.popularity)?;
    let rated = request.ratings.rated_items();
    let engine = RankingEngine::new(&scored, &rated);

    let response = match &request.condition {
        Condition::TopN => items(engine.top_n(num_rec)),
        Condition::Hate => items(engine.hate_items(&bundle.averages, num_rec)),
        Condition::Hip => items(engine.hip_items(config.hip_pool_size, num_rec)),
        Condition::NoClue => {
            let stds = EnsembleUncertaintyEstimator::new(&bundle.ensemble).item_std(&request.ratings)?;
            items(engine.no_clue_items(&stds, num_rec))
        }
        Condition::Controversial => {
            let finder = NeighborFinder::new(&bundle.model);
            let neighbors = finder.find(
                &fold.user_vector,
                config.neighbor_metric,
                config.controversy_neighbors,
            );
            let variances = finder.controversy_scores(&neighbors);
            items(engine.controversial_items(&variances, num_rec))
        }
        Condition::EmotionTopN(tuning) => {
            emotion_top_n(bundle, config, &engine.by_discounted_score(), tuning, num_rec)?
        }
        Condition::DiverseByEmotion(options) => {
            diverse_by_emotion(bundle, config, &engine.by_discounted_score(), options, num_rec)?
        }
        Condition::EmotionDiverseN {
            tuning,
            diversity,
            criterion,
        } => emotion_diverse_n(
            bundle,
            config,
            &engine.by_discounted_score(),
            tuning,
            diversity,
            *criterion,
            num_rec,
        )?,
        Condition::CommunityAdvisors => {
            let finder = NeighborFinder::new(&bundle.model);
            let mut neighbors = finder.find(
                &fold.user_vector,
                config.neighbor_metric,
                config.advisor_search_space,
            );
            neighbors.truncate(num_rec);
            let mut rng = StdRng::seed_from_u64(request.ratings.seed());
            RecommendationResponse::Advisors(finder.advisor_profiles(
                &neighbors,
                &rated,
                config.advisor_pool_size,
                num_rec,
                &mut rng,
            ))
        }
        Condition::PreferenceViz(options) => {
            preference_viz(bundle, config, &fold, &scored, &rated, request, options)
        }
    };

    if response.len() < num_rec {
        tracing::debug!(
            requested = num_rec,
            returned = response.len(),
            "Fewer candidates than requested"
        );
    }
    tracing::info!(
        user_id = %request.user_id,
        rated = rated.len(),
        returned = response.len(),
        "Recommendation computed"
    );
    Ok(response)
}

fn items(list: Vec<ScoredItem>) -> RecommendationResponse {
    RecommendationResponse::Items(item_ids(&list))
}

fn candidate_ids(pool: &[EmotionCandidate], num_rec: usize) -> RecommendationResponse {
    RecommendationResponse::Items(pool.iter().take(num_rec).map(|c| c.item.item_id).collect())
}

fn emotion_top_n(
    bundle: &ModelBundle,
    config: &Config,
    ranked: &[ScoredItem],
    tuning: &EmotionTuning,
    num_rec: usize,
) -> RecommenderResult<RecommendationResponse> {
    let emotions = bundle.emotions()?;
    let target = tuning.target.normalize(config.emotion_low, config.emotion_high);
    let pool_size = tuning.item_pool_size.unwrap_or(config.candidate_pool_size);
    let pool = candidate_pool(ranked, emotions, pool_size);

    let tuned = EmotionTuner::from_tuning(&target, tuning).rank(tuning.ranking, pool);
    Ok(candidate_ids(&tuned, num_rec))
}

fn diverse_by_emotion(
    bundle: &ModelBundle,
    config: &Config,
    ranked: &[ScoredItem],
    options: &DiversityOptions,
    num_rec: usize,
) -> RecommenderResult<RecommendationResponse> {
    let emotions = bundle.emotions()?;
    let pool_size = options.item_pool_size.unwrap_or(config.candidate_pool_size);
    let pool = candidate_pool(ranked, emotions, pool_size);

    let ids: Vec<_> = pool.iter().map(|c| c.item.item_id).collect();
    let vectors: Vec<Vec<f64>> = pool.iter().map(|c| c.profile.to_vec()).collect();
    let sampling_size = options.sampling_size.unwrap_or(num_rec);

    let mut selection = Diversifier::from_options(options).select(&ids, &vectors, sampling_size)?;
    selection.items.truncate(num_rec);
    Ok(RecommendationResponse::Items(selection.items))
}

fn emotion_diverse_n(
    bundle: &ModelBundle,
    config: &Config,
    ranked: &[ScoredItem],
    tuning: &EmotionTuning,
    diversity: &DiversityOptions,
    criterion: DiversityCriterion,
    num_rec: usize,
) -> RecommenderResult<RecommendationResponse> {
    let emotions = bundle.emotions()?;
    let target = tuning.target.normalize(config.emotion_low, config.emotion_high);
    let pool_size = diversity
        .item_pool_size
        .or(tuning.item_pool_size)
        .unwrap_or(config.candidate_pool_size);
    let pool = candidate_pool(ranked, emotions, pool_size);

    let tags: Vec<EmotionTag> = match criterion {
        DiversityCriterion::Unspecified if !target.unspecified.is_empty() => {
            target.unspecified.clone()
        }
        _ => EmotionTag::ALL.to_vec(),
    };
    let ids: Vec<_> = pool.iter().map(|c| c.item.item_id).collect();
    let vectors: Vec<Vec<f64>> = pool.iter().map(|c| c.features(&tags)).collect();
    let sampling_size = diversity.sampling_size.unwrap_or(num_rec);

    let selection = Diversifier::from_options(diversity).select(&ids, &vectors, sampling_size)?;
    let diversified: Vec<EmotionCandidate> = selection
        .indices
        .iter()
        .map(|&i| pool[i].clone())
        .collect();

    let tuned = EmotionTuner::from_tuning(&target, tuning).rank(tuning.ranking, diversified);
    Ok(candidate_ids(&tuned, num_rec))
}

fn preference_viz(
    bundle: &ModelBundle,
    config: &Config,
    fold: &FoldIn,
    scored: &[ScoredItem],
    rated: &HashSet<ItemId>,
    request: &RecommendationRequest,
    options: &VizOptions,
) -> RecommendationResponse {
    let min_rating_count = options
        .min_rating_count
        .unwrap_or(config.viz_min_rating_count);
    let community = match options.community_source {
        CommunitySource::Global => global_community_scores(&bundle.averages),
        CommunitySource::NnPredicted => {
            let finder = NeighborFinder::new(&bundle.model);
            let neighbors = finder.find(
                &fold.user_vector,
                config.neighbor_metric,
                config.advisor_search_space,
            );
            finder.neighborhood_average(&neighbors)
        }
    };
    let candidates = viz_candidates(scored, &community, rated, min_rating_count);

    let visualizer = ClusterVisualizer {
        mode: options.mode,
        algo: options.algo,
        randomize: options.randomize,
        init_sample_size: options
            .init_sample_size
            .unwrap_or(config.viz_init_sample_size),
    };
    RecommendationResponse::Visualization(visualizer.visualize(
        &candidates,
        request.num_rec,
        request.ratings.seed(),
    ))
}
