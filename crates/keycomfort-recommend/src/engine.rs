use std::thread;

use keycomfort_core::{BigramPair, PreferenceDataset};
use keycomfort_features::{FeatureSet, FeatureStore};
use keycomfort_model::{PosteriorSampler, PreferenceModel, TrainedModel};
use serde::{Deserialize, Serialize};

use crate::{
    config::RecommendationConfig,
    error::RecommendationError,
    pool::candidate_pool,
    projection::{PairProjection, pair_distance},
};

/// Candidates per thread when updating coverage distances.
const DISTANCE_CHUNK: usize = 1024;

/// Score components of one candidate, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub information_value: f64,
    pub coverage_value: f64,
    pub combined_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// 1-based position in selection order
    pub rank: usize,
    pub bigram_a: String,
    pub bigram_b: String,
    /// Model probability that `bigram_a` is preferred, when a model was used
    pub probability: Option<f64>,
    #[serde(flatten)]
    pub score: CandidateScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub layout: String,
    pub n_candidates: usize,
    pub n_observed_pairs: usize,
    pub explained_variance: Vec<f64>,
    pub used_model: bool,
    pub recommendations: Vec<Recommendation>,
}

/// Normalized binary entropy of a preference probability: 1 at 0.5, 0 at 0 or 1.
#[must_use]
pub fn information_value(probability: f64) -> f64 {
    let p = probability.clamp(0.0, 1.0);
    let h = |x: f64| if x > 0.0 { -x * x.log2() } else { 0.0 };
    h(p) + h(1.0 - p)
}

/// Candidate pairs with their fixed information values and projected positions.
///
/// Coverage depends on what has been selected so far and is computed on demand, either
/// against an explicit selection ([`ScoredPool::scores`]) or incrementally during
/// [`ScoredPool::select`].
#[derive(Debug, Clone)]
pub struct ScoredPool {
    pairs: Vec<BigramPair>,
    probabilities: Vec<Option<f64>>,
    information: Vec<f64>,
    points: Vec<Vec<f64>>,
    /// Projected positions of already observed pairs
    reference: Vec<Vec<f64>>,
    information_weight: f64,
    coverage_weight: f64,
}

impl ScoredPool {
    /// Fails when `probabilities` or `points` do not have one entry per pair.
    pub fn new(
        pairs: Vec<BigramPair>,
        probabilities: Vec<Option<f64>>,
        points: Vec<Vec<f64>>,
        reference: Vec<Vec<f64>>,
        config: &RecommendationConfig,
    ) -> Result<Self, RecommendationError> {
        if probabilities.len() != pairs.len() || points.len() != pairs.len() {
            return Err(RecommendationError::MismatchedPool {
                pairs: pairs.len(),
                probabilities: probabilities.len(),
                points: points.len(),
            });
        }
        let information = probabilities
            .iter()
            .map(|p| p.map_or(1.0, information_value))
            .collect();
        Ok(Self {
            pairs,
            probabilities,
            information,
            points,
            reference,
            information_weight: config.information_weight,
            coverage_weight: config.coverage_weight,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[must_use]
    pub fn pairs(&self) -> &[BigramPair] {
        &self.pairs
    }

    fn min_distance(&self, point: &[f64], others: impl Iterator<Item = usize>) -> f64 {
        self.reference
            .iter()
            .map(|r| pair_distance(point, r))
            .chain(others.map(|j| pair_distance(point, &self.points[j])))
            .fold(f64::INFINITY, f64::min)
    }

    /// Scores remaining candidates given raw minimum distances; `None` marks taken ones.
    fn score_remaining(&self, distances: &[Option<f64>]) -> Vec<(usize, CandidateScore)> {
        let max = distances
            .iter()
            .flatten()
            .copied()
            .fold(0.0, f64::max);
        distances
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.map(|d| (i, d)))
            .map(|(i, d)| {
                let coverage_value = if max.is_infinite() {
                    1.0
                } else if max > 0.0 {
                    d / max
                } else {
                    0.0
                };
                let information_value = self.information[i];
                (
                    i,
                    CandidateScore {
                        information_value,
                        coverage_value,
                        combined_value: self.information_weight * information_value
                            + self.coverage_weight * coverage_value,
                    },
                )
            })
            .collect()
    }

    /// Scores every candidate not in `selected`, with coverage measured against the
    /// observed pairs and `selected`.
    ///
    /// Coverage is the minimum distance to that set, divided by the largest such
    /// distance among the scored candidates. With nothing to measure against, every
    /// candidate has coverage 1.
    #[must_use]
    pub fn scores(&self, selected: &[usize]) -> Vec<(usize, CandidateScore)> {
        let distances: Vec<Option<f64>> = (0..self.len())
            .map(|i| {
                (!selected.contains(&i))
                    .then(|| self.min_distance(&self.points[i], selected.iter().copied()))
            })
            .collect();
        self.score_remaining(&distances)
    }

    /// Greedy max-min selection of up to `n` candidates.
    ///
    /// Each step picks the remaining candidate with the highest combined score against
    /// everything picked so far, ties going to the lowest index. This approximates
    /// diversity maximization; only step-wise optimality is guaranteed.
    #[must_use]
    pub fn select(&self, n: usize) -> Vec<(usize, CandidateScore)> {
        let mut distances: Vec<Option<f64>> = self
            .points
            .iter()
            .map(|p| Some(self.min_distance(p, std::iter::empty())))
            .collect();
        let mut picks = Vec::with_capacity(n.min(self.len()));
        for _ in 0..n.min(self.len()) {
            let Some((best, score)) = best_candidate(&self.score_remaining(&distances)) else {
                break;
            };
            picks.push((best, score));
            distances[best] = None;
            self.update_distances(&mut distances, best);
        }
        picks
    }

    fn update_distances(&self, distances: &mut [Option<f64>], picked: usize) {
        let picked = &self.points[picked];
        thread::scope(|s| {
            for (chunk_index, chunk) in distances.chunks_mut(DISTANCE_CHUNK).enumerate() {
                let offset = chunk_index * DISTANCE_CHUNK;
                s.spawn(move || {
                    for (i, d) in chunk.iter_mut().enumerate() {
                        if let Some(d) = d {
                            *d = d.min(pair_distance(&self.points[offset + i], picked));
                        }
                    }
                });
            }
        });
    }

    fn recommendation(&self, rank: usize, index: usize, score: CandidateScore) -> Recommendation {
        let pair = self.pairs[index];
        Recommendation {
            rank,
            bigram_a: pair.low().to_string(),
            bigram_b: pair.high().to_string(),
            probability: self.probabilities[index],
            score,
        }
    }
}

/// Highest combined score; scores are in index order, so ties keep the lowest index.
fn best_candidate(scores: &[(usize, CandidateScore)]) -> Option<(usize, CandidateScore)> {
    let mut best: Option<(usize, CandidateScore)> = None;
    for &(index, score) in scores {
        if best.is_none_or(|(_, b)| score.combined_value > b.combined_value) {
            best = Some((index, score));
        }
    }
    best
}

/// Chooses which comparisons to collect next.
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new(config: RecommendationConfig) -> Result<Self, RecommendationError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Builds the scored candidate pool over the layout of `store`.
    ///
    /// Pairs are embedded with `feature_set`; information values come from `model`
    /// when given (its own feature set is used for prediction) and are 1 otherwise.
    /// Observed pairs containing keys outside the layout are ignored.
    pub fn score_pool(
        &self,
        dataset: &PreferenceDataset,
        store: &FeatureStore,
        feature_set: &FeatureSet,
        model: Option<&TrainedModel>,
    ) -> Result<(ScoredPool, PairProjection), RecommendationError> {
        feature_set.require_columns()?;
        store.validate(feature_set)?;

        let layout = store.layout();
        let observed = dataset.observed_pairs();
        let in_layout = |pair: &BigramPair| {
            [pair.low(), pair.high()]
                .iter()
                .all(|b| layout.position(b.first()).is_some() && layout.position(b.second()).is_some())
        };
        let observed_in_layout: Vec<BigramPair> =
            observed.iter().copied().filter(in_layout).collect();
        if observed_in_layout.len() < observed.len() {
            log::warn!(
                "{} observed pairs use keys outside layout '{}'; ignored for coverage",
                observed.len() - observed_in_layout.len(),
                layout.name
            );
        }

        let pairs = candidate_pool(
            &layout.bigrams(),
            &observed,
            self.config.max_candidates,
            self.config.seed,
        )?;

        let difference = |pair: BigramPair| -> Result<Vec<f64>, RecommendationError> {
            let a = store.vector(pair.low(), feature_set)?;
            let b = store.vector(pair.high(), feature_set)?;
            Ok(a.values().iter().zip(b.values()).map(|(x, y)| x - y).collect())
        };
        let candidate_differences = pairs
            .iter()
            .map(|&p| difference(p))
            .collect::<Result<Vec<_>, _>>()?;
        let observed_differences = observed_in_layout
            .iter()
            .map(|&p| difference(p))
            .collect::<Result<Vec<_>, _>>()?;

        let all: Vec<Vec<f64>> = candidate_differences
            .iter()
            .chain(&observed_differences)
            .cloned()
            .collect();
        let projection = PairProjection::fit(&all, self.config.n_components)
            .ok_or(RecommendationError::EmptyProjection)?;
        let points = candidate_differences
            .iter()
            .map(|d| projection.project(d))
            .collect();
        let reference = observed_differences
            .iter()
            .map(|d| projection.project(d))
            .collect();

        let probabilities = match model {
            Some(model) => pairs
                .iter()
                .map(|p| {
                    model
                        .predict_preference(store, p.low(), p.high())
                        .map(|prediction| Some(prediction.probability))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![None; pairs.len()],
        };

        Ok((
            ScoredPool::new(pairs, probabilities, points, reference, &self.config)?,
            projection,
        ))
    }

    /// Ranks up to `n_recommendations` unobserved pairs by greedy max-min selection.
    pub fn recommend(
        &self,
        dataset: &PreferenceDataset,
        store: &FeatureStore,
        feature_set: &FeatureSet,
        model: Option<&TrainedModel>,
    ) -> Result<RecommendationReport, RecommendationError> {
        let (pool, projection) = self.score_pool(dataset, store, feature_set, model)?;
        log::info!(
            "selecting {} of {} candidate pairs ({} components, variance {:.3?})",
            self.config.n_recommendations.min(pool.len()),
            pool.len(),
            projection.explained_variance().len(),
            projection.explained_variance()
        );
        let recommendations = pool
            .select(self.config.n_recommendations)
            .into_iter()
            .zip(1..)
            .map(|((index, score), rank)| pool.recommendation(rank, index, score))
            .collect();
        Ok(RecommendationReport {
            layout: store.layout().name.clone(),
            n_candidates: pool.len(),
            n_observed_pairs: dataset.observed_pairs().len(),
            explained_variance: projection.explained_variance().to_vec(),
            used_model: model.is_some(),
            recommendations,
        })
    }
}

/// Fits a model for recommendation after validating the recommendation settings, so a
/// bad configuration fails before any sampling.
pub fn fit_for_recommendation<S>(
    config: &RecommendationConfig,
    model: &PreferenceModel<S>,
    dataset: &PreferenceDataset,
    store: &FeatureStore,
    feature_set: &FeatureSet,
) -> Result<TrainedModel, RecommendationError>
where
    S: PosteriorSampler,
{
    config.validate()?;
    Ok(model.fit(dataset, store, feature_set)?)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use keycomfort_core::{ConfigError, RawPreferenceRow};
    use keycomfort_features::{Layout, source::all_bigram_feature_sources};
    use keycomfort_model::{
        LogDensity, ModelConfig, ModelError, SamplerError, SamplerOutput, SamplerSettings,
    };

    use super::*;

    fn row(participant: &str, a: &str, b: &str, chosen: &str) -> RawPreferenceRow {
        RawPreferenceRow {
            participant: Some(participant.to_owned()),
            bigram1: a.to_owned(),
            bigram2: b.to_owned(),
            chosen_bigram: chosen.to_owned(),
            bigram1_time: None,
            bigram2_time: None,
            strength: None,
        }
    }

    fn qa_sd_dataset() -> PreferenceDataset {
        let mut rows: Vec<_> = (0..10).map(|_| row("P1", "qa", "sd", "qa")).collect();
        rows.push(row("P2", "sd", "qa", "sd"));
        PreferenceDataset::load("qa-sd", rows).unwrap()
    }

    fn store() -> FeatureStore {
        FeatureStore::new(Layout::qwerty_left(), all_bigram_feature_sources(None)).unwrap()
    }

    fn feature_set() -> FeatureSet {
        FeatureSet::new(
            vec![
                "same_finger".to_owned(),
                "row_span".to_owned(),
                "home_row".to_owned(),
            ],
            Vec::new(),
            Vec::new(),
        )
        .unwrap()
    }

    fn engine(n: usize, max_candidates: usize) -> RecommendationEngine {
        RecommendationEngine::new(RecommendationConfig {
            n_recommendations: n,
            max_candidates,
            ..RecommendationConfig::default()
        })
        .unwrap()
    }

    #[derive(Default)]
    struct CountingSampler {
        calls: Arc<AtomicUsize>,
    }

    impl PosteriorSampler for CountingSampler {
        fn sample(
            &self,
            _target: &dyn LogDensity,
            _settings: &SamplerSettings,
        ) -> Result<SamplerOutput, SamplerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SamplerError::ChainPanicked { chain: 0 })
        }
    }

    #[test]
    fn test_information_value_peaks_at_half() {
        assert!((information_value(0.5) - 1.0).abs() < 1e-12);
        assert!(information_value(0.0).abs() < 1e-12);
        assert!(information_value(1.0).abs() < 1e-12);
        assert!(information_value(0.9) < information_value(0.7));
        assert!((information_value(0.2) - information_value(0.8)).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_weights_fail_before_sampling() {
        let config = RecommendationConfig {
            information_weight: 0.6,
            coverage_weight: 0.6,
            ..RecommendationConfig::default()
        };
        let sampler = CountingSampler::default();
        let calls = Arc::clone(&sampler.calls);
        let model = PreferenceModel::with_sampler(ModelConfig::default(), sampler);
        let err = fit_for_recommendation(
            &config,
            &model,
            &qa_sd_dataset(),
            &store(),
            &feature_set(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RecommendationError::Config(ConfigError::RecommendationWeights { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            RecommendationEngine::new(config),
            Err(RecommendationError::Config(_))
        ));
    }

    #[test]
    fn test_valid_config_reaches_the_sampler() {
        let sampler = CountingSampler::default();
        let calls = Arc::clone(&sampler.calls);
        let model = PreferenceModel::with_sampler(ModelConfig::default(), sampler);
        let err = fit_for_recommendation(
            &RecommendationConfig::default(),
            &model,
            &qa_sd_dataset(),
            &store(),
            &feature_set(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RecommendationError::Model(ModelError::Sampler(SamplerError::ChainPanicked { .. }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recommendations_exclude_observed_pairs() {
        let dataset = qa_sd_dataset();
        let report = engine(20, 500)
            .recommend(&dataset, &store(), &feature_set(), None)
            .unwrap();
        assert_eq!(report.recommendations.len(), 20);
        assert_eq!(report.n_candidates, 500);
        assert_eq!(report.n_observed_pairs, 1);
        assert!(!report.used_model);
        for (i, r) in report.recommendations.iter().enumerate() {
            assert_eq!(r.rank, i + 1);
            assert!(!(r.bigram_a == "qa" && r.bigram_b == "sd"));
            assert!((r.score.information_value - 1.0).abs() < 1e-12);
            assert!((0.0..=1.0).contains(&r.score.coverage_value));
        }
    }

    #[test]
    fn test_greedy_choice_is_locally_optimal() {
        let dataset = qa_sd_dataset();
        let (pool, _) = engine(10, 300)
            .score_pool(&dataset, &store(), &feature_set(), None)
            .unwrap();
        let picks = pool.select(10);
        assert_eq!(picks.len(), 10);
        for step in 0..picks.len() {
            let selected: Vec<usize> = picks[..step].iter().map(|&(i, _)| i).collect();
            let (chosen, chosen_score) = picks[step];
            let scores = pool.scores(&selected);
            let recomputed = scores.iter().find(|(i, _)| *i == chosen).unwrap().1;
            assert!((recomputed.combined_value - chosen_score.combined_value).abs() < 1e-12);
            for (i, score) in &scores {
                assert!(
                    chosen_score.combined_value >= score.combined_value - 1e-12,
                    "step {step}: candidate {i} scores {} above chosen {}",
                    score.combined_value,
                    chosen_score.combined_value
                );
            }
        }
        let unique: std::collections::BTreeSet<_> = picks.iter().map(|&(i, _)| i).collect();
        assert_eq!(unique.len(), picks.len());
    }

    #[test]
    fn test_recommendation_is_deterministic() {
        let dataset = qa_sd_dataset();
        let store = store();
        let engine = engine(15, 400);
        let a = engine.recommend(&dataset, &store, &feature_set(), None).unwrap();
        let b = engine.recommend(&dataset, &store, &feature_set(), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let config = RecommendationConfig::default();
        let pairs: Vec<BigramPair> = ["qa-sd", "qa-fg", "qa-zx"]
            .iter()
            .map(|s| {
                let (a, b) = s.split_once('-').unwrap();
                BigramPair::new(a.parse().unwrap(), b.parse().unwrap()).unwrap()
            })
            .collect();
        let pool = ScoredPool::new(
            pairs,
            vec![None; 3],
            vec![vec![1.0], vec![1.0], vec![1.0]],
            Vec::new(),
            &config,
        )
        .unwrap();
        let picks = pool.select(2);
        assert_eq!(picks[0].0, 0);
        assert_eq!(picks[1].0, 1);
        // Identical points leave no coverage once one is picked.
        assert!(picks[1].1.coverage_value.abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_pool_is_rejected() {
        let pair = BigramPair::new("qa".parse().unwrap(), "sd".parse().unwrap()).unwrap();
        let result = ScoredPool::new(
            vec![pair],
            vec![None, None],
            vec![vec![0.0]],
            Vec::new(),
            &RecommendationConfig::default(),
        );
        assert!(matches!(
            result,
            Err(RecommendationError::MismatchedPool {
                pairs: 1,
                probabilities: 2,
                points: 1
            })
        ));
    }

    #[test]
    fn test_best_candidate_prefers_lowest_index_on_ties() {
        let score = |combined_value| CandidateScore {
            information_value: 1.0,
            coverage_value: 1.0,
            combined_value,
        };
        let scores = [(2, score(0.4)), (5, score(0.9)), (7, score(0.9)), (9, score(0.1))];
        assert_eq!(best_candidate(&scores).map(|(i, _)| i), Some(5));
        assert!(best_candidate(&[]).is_none());
    }

    #[test]
    fn test_model_probabilities_drive_information() {
        let dataset = qa_sd_dataset();
        let store = store();
        let set = FeatureSet::new(vec!["same_finger".to_owned()], Vec::new(), Vec::new()).unwrap();
        let model = PreferenceModel::new(ModelConfig {
            n_chains: 2,
            n_warmup: 300,
            n_draws: 400,
            max_rhat: 1.1,
            ..ModelConfig::default()
        });
        let trained =
            fit_for_recommendation(&RecommendationConfig::default(), &model, &dataset, &store, &set)
                .unwrap();
        let report = engine(5, 200)
            .recommend(&dataset, &store, &set, Some(&trained))
            .unwrap();
        assert!(report.used_model);
        for r in &report.recommendations {
            let p = r.probability.unwrap();
            assert!((r.score.information_value - information_value(p)).abs() < 1e-12);
        }
    }
}
