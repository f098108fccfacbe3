//! Held-out scoring of feature sets and candidate importance.

use std::thread;

use keycomfort_core::PreferenceDataset;
use keycomfort_features::{FeatureSet, FeatureStore};
use keycomfort_model::{ModelError, PosteriorSampler, PreferenceModel};
use keycomfort_stats::{descriptive::median, metrics};
use serde::{Deserialize, Serialize};

use crate::{error::SelectionError, folds::ParticipantFolds};

/// Held-out performance of one feature set on one fold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldScore {
    pub fold: usize,
    pub n_test: usize,
    pub mean_log_likelihood: f64,
    pub accuracy: f64,
}

/// Improvement of the candidate set over the baseline on one fold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldGain {
    pub fold: usize,
    pub log_likelihood_gain: f64,
    pub accuracy_gain: f64,
}

/// Cross-validated importance of one candidate relative to a baseline set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateImportance {
    pub candidate: String,
    /// Median held-out mean log-likelihood gain across folds
    pub importance: f64,
    /// Median held-out accuracy gain across folds
    pub accuracy_gain: f64,
    pub folds: Vec<FoldGain>,
}

impl CandidateImportance {
    pub(crate) fn from_scores(
        candidate: String,
        baseline: &[FoldScore],
        scores: &[FoldScore],
    ) -> Self {
        let folds: Vec<FoldGain> = baseline
            .iter()
            .zip(scores)
            .map(|(base, with)| FoldGain {
                fold: base.fold,
                log_likelihood_gain: with.mean_log_likelihood - base.mean_log_likelihood,
                accuracy_gain: with.accuracy - base.accuracy,
            })
            .collect();
        let ll: Vec<f64> = folds.iter().map(|g| g.log_likelihood_gain).collect();
        let acc: Vec<f64> = folds.iter().map(|g| g.accuracy_gain).collect();
        Self {
            candidate,
            importance: median(&ll).unwrap_or(f64::NAN),
            accuracy_gain: median(&acc).unwrap_or(f64::NAN),
            folds,
        }
    }
}

/// Scores `set` on every fold, fitting on the remaining participants.
///
/// Folds are fitted concurrently and joined before returning. A set without columns
/// predicts 0.5 for every preference.
pub(crate) fn score_folds<S>(
    model: &PreferenceModel<S>,
    dataset: &PreferenceDataset,
    store: &FeatureStore,
    folds: &ParticipantFolds,
    set: &FeatureSet,
) -> Result<Vec<FoldScore>, SelectionError>
where
    S: PosteriorSampler,
{
    let results = thread::scope(|s| {
        let handles = (0..folds.len())
            .map(|fold| s.spawn(move || score_fold(model, dataset, store, folds, set, fold)))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .enumerate()
            .map(|(fold, handle)| {
                handle
                    .join()
                    .unwrap_or(Err(SelectionError::FoldPanicked { fold }))
            })
            .collect::<Vec<_>>()
    });
    results.into_iter().collect()
}

fn score_fold<S>(
    model: &PreferenceModel<S>,
    dataset: &PreferenceDataset,
    store: &FeatureStore,
    folds: &ParticipantFolds,
    set: &FeatureSet,
    fold: usize,
) -> Result<FoldScore, SelectionError>
where
    S: PosteriorSampler,
{
    let test = dataset.subset(&folds.folds()[fold].test_rows)?;
    if set.is_empty() {
        return Ok(chance_score(fold, &test));
    }
    let train = dataset.subset(&folds.train_rows(fold))?;
    let with_context = |source: ModelError| SelectionError::Fold {
        fold,
        features: set.column_names().join(", "),
        source,
    };
    let trained = model.fit(&train, store, set).map_err(with_context)?;
    let evaluation = trained
        .evaluate(&test, store)
        .map_err(|e| with_context(e.into()))?;
    log::debug!(
        "fold {fold} [{}]: held-out log-likelihood {:.4}, accuracy {:.3}",
        set.column_names().join(", "),
        evaluation.mean_log_likelihood,
        evaluation.accuracy
    );
    Ok(FoldScore {
        fold,
        n_test: evaluation.n_observations,
        mean_log_likelihood: evaluation.mean_log_likelihood,
        accuracy: evaluation.accuracy,
    })
}

fn chance_score(fold: usize, test: &PreferenceDataset) -> FoldScore {
    let outcomes: Vec<bool> = test
        .observations()
        .iter()
        .map(keycomfort_core::PreferenceObservation::first_preferred)
        .collect();
    let probabilities = vec![0.5; outcomes.len()];
    FoldScore {
        fold,
        n_test: outcomes.len(),
        mean_log_likelihood: metrics::mean_log_likelihood(&probabilities, &outcomes)
            .unwrap_or(f64::NAN),
        accuracy: metrics::accuracy(&probabilities, &outcomes).unwrap_or(f64::NAN),
    }
}
