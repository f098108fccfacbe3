//! Posterior summaries and everything computed from them.
//!
//! A [`TrainedModel`] keeps the posterior mean and full covariance of the feature
//! weights, so predictions propagate weight uncertainty exactly for linear quantities:
//!
//! ```text
//! comfort(b)      = w · f(b)            mean m·f,  std sqrt(fᵀ Σ f)
//! logit(A ≻ B)    = w · (f(A) - f(B))   mean m·d,  var dᵀ Σ d
//! P(A ≻ B)        ≈ sigmoid(mean / sqrt(1 + π·var/8))
//! ```
//!
//! The probability uses the probit approximation of the logistic-normal integral.
//! Participant effects are excluded everywhere: these are population-level estimates.
//! Control columns enter predictions but not comfort scores.

use keycomfort_core::{Bigram, PreferenceDataset};
use keycomfort_features::{BigramFrequencies, FeatureError, FeatureSet, FeatureStore};
use keycomfort_stats::{descriptive::DescriptiveStats, metrics, percentiles::CredibleInterval};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{
    config::ModelConfig,
    diagnostics::{ConvergenceDiagnostics, ParameterDiagnostics},
    error::ModelError,
    likelihood::sigmoid,
    sampler::SamplerOutput,
};

const INTERVAL_MASS: f64 = 0.95;

/// Posterior summary of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub name: String,
    pub mean: f64,
    pub std_dev: f64,
    /// Lower bound of the central 95% credible interval
    pub lower: f64,
    /// Upper bound of the central 95% credible interval
    pub upper: f64,
    pub rhat: f64,
    pub ess: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreferencePrediction {
    /// Posterior-predictive probability that the first bigram is preferred
    pub probability: f64,
    /// `p(1 - p) * sd(logit)`, the delta-method standard deviation of `probability`
    pub uncertainty: f64,
    pub logit_mean: f64,
    pub logit_std: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComfortScore {
    pub mean: f64,
    pub std_dev: f64,
}

/// How per-bigram comfort is aggregated into a per-key score.
#[derive(Debug, Clone, Copy)]
pub enum KeyWeighting<'a> {
    /// Every bigram containing the key counts equally
    Uniform,
    /// Bigrams are weighted by corpus frequency; unseen bigrams get zero weight
    Frequency(&'a BigramFrequencies),
}

impl KeyWeighting<'_> {
    fn weight(&self, bigram: Bigram) -> f64 {
        match self {
            Self::Uniform => 1.0,
            Self::Frequency(table) => table.frequency(bigram),
        }
    }
}

/// Held-out performance of population-level predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub n_observations: usize,
    pub accuracy: f64,
    /// `None` when only one outcome class is present
    pub auc: Option<f64>,
    pub log_loss: f64,
    pub mean_log_likelihood: f64,
    pub mean_uncertainty: f64,
}

/// Result of [`PreferenceModel::fit`](crate::PreferenceModel::fit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    feature_set: FeatureSet,
    config: ModelConfig,
    /// One entry per model column, in [`FeatureSet::column_names`] order
    weights: Vec<ParameterSummary>,
    /// Posterior covariance of `weights`
    weight_covariance: Vec<Vec<f64>>,
    participant_effects: Vec<ParameterSummary>,
    diagnostics: ConvergenceDiagnostics,
    n_observations: usize,
}

fn summarize(name: &str, draws: &[f64], rhat: f64, ess: f64) -> ParameterSummary {
    let stats = DescriptiveStats::new(draws.iter().copied());
    let interval = CredibleInterval::new(draws, INTERVAL_MASS);
    ParameterSummary {
        name: name.to_owned(),
        mean: stats.as_ref().map_or(f64::NAN, |s| s.mean),
        std_dev: stats.as_ref().map_or(f64::NAN, |s| s.std_dev),
        lower: interval.lower,
        upper: interval.upper,
        rhat,
        ess,
    }
}

impl TrainedModel {
    /// Aggregates sampler draws into summaries. Parameters are ordered as the model
    /// columns followed by one effect per participant.
    pub(crate) fn from_draws(
        feature_set: FeatureSet,
        config: ModelConfig,
        output: &SamplerOutput,
        names: &[String],
        diagnostics: ConvergenceDiagnostics,
        parameter_diagnostics: &ParameterDiagnostics,
        n_observations: usize,
    ) -> Self {
        let k = feature_set.len();
        let all_draws: Vec<Vec<f64>> = output
            .chains
            .iter()
            .flat_map(|c| c.draws.iter().cloned())
            .collect();
        let column = |j: usize| all_draws.iter().map(|d| d[j]).collect::<Vec<_>>();
        let summaries = names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                summarize(
                    name,
                    &column(j),
                    parameter_diagnostics.rhat[j],
                    parameter_diagnostics.ess[j],
                )
            })
            .collect::<Vec<_>>();
        let (weights, participant_effects) = summaries.split_at(k);

        let n = all_draws.len();
        let weight_draws = DMatrix::from_fn(n, k, |i, j| all_draws[i][j]);
        let means = DVector::from_iterator(k, weights.iter().map(|w| w.mean));
        let centered = DMatrix::from_fn(n, k, |i, j| weight_draws[(i, j)] - means[j]);
        #[expect(clippy::cast_precision_loss)]
        let denominator = (n.max(2) - 1) as f64;
        let covariance = centered.transpose() * &centered / denominator;
        let weight_covariance = (0..k)
            .map(|i| (0..k).map(|j| covariance[(i, j)]).collect())
            .collect();

        Self {
            feature_set,
            config,
            weights: weights.to_vec(),
            weight_covariance,
            participant_effects: participant_effects.to_vec(),
            diagnostics,
            n_observations,
        }
    }

    #[must_use]
    pub fn feature_set(&self) -> &FeatureSet {
        &self.feature_set
    }

    /// Configuration the model was fit with.
    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Weight summaries in model column order (design columns, then controls).
    #[must_use]
    pub fn feature_weights(&self) -> &[ParameterSummary] {
        &self.weights
    }

    #[must_use]
    pub fn participant_effects(&self) -> &[ParameterSummary] {
        &self.participant_effects
    }

    #[must_use]
    pub fn diagnostics(&self) -> &ConvergenceDiagnostics {
        &self.diagnostics
    }

    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    fn linear_moments(&self, x: &[f64], columns: usize) -> (f64, f64) {
        let mean = self.weights[..columns]
            .iter()
            .zip(x)
            .map(|(w, v)| w.mean * v)
            .sum::<f64>();
        let mut var = 0.0;
        for (i, xi) in x.iter().enumerate().take(columns) {
            for (j, xj) in x.iter().enumerate().take(columns) {
                var += xi * self.weight_covariance[i][j] * xj;
            }
        }
        (mean, var.max(0.0))
    }

    /// Prediction for a precomputed feature difference `f(A) - f(B)` over all columns.
    #[must_use]
    pub fn predict_difference(&self, difference: &[f64]) -> PreferencePrediction {
        let (logit_mean, var) = self.linear_moments(difference, self.weights.len());
        let kappa = 1.0 / (1.0 + std::f64::consts::PI * var / 8.0).sqrt();
        let probability = sigmoid(kappa * logit_mean);
        let logit_std = var.sqrt();
        PreferencePrediction {
            probability,
            uncertainty: probability * (1.0 - probability) * logit_std,
            logit_mean,
            logit_std,
        }
    }

    /// Probability that `first` is preferred over `second`.
    pub fn predict_preference(
        &self,
        store: &FeatureStore,
        first: Bigram,
        second: Bigram,
    ) -> Result<PreferencePrediction, FeatureError> {
        let a = store.vector(first, &self.feature_set)?;
        let b = store.vector(second, &self.feature_set)?;
        let difference: Vec<f64> = a.values().iter().zip(b.values()).map(|(x, y)| x - y).collect();
        Ok(self.predict_difference(&difference))
    }

    /// Comfort of a feature vector in model column order; controls are ignored.
    #[must_use]
    pub fn comfort_from_values(&self, values: &[f64]) -> ComfortScore {
        let (mean, var) = self.linear_moments(values, self.feature_set.design_len());
        ComfortScore {
            mean,
            std_dev: var.sqrt(),
        }
    }

    /// Population-level comfort of `bigram`: the posterior of `w · f(bigram)` over
    /// design columns.
    pub fn comfort_score(
        &self,
        store: &FeatureStore,
        bigram: Bigram,
    ) -> Result<ComfortScore, FeatureError> {
        let v = store.vector(bigram, &self.feature_set)?;
        Ok(self.comfort_from_values(v.values()))
    }

    /// Comfort of `key`, aggregated over every layout bigram that contains it.
    ///
    /// The score is the comfort of the `weighting`-weighted mean feature vector of
    /// those bigrams. Because comfort is linear in the features, its mean equals the
    /// weighted mean of the bigram comfort means, and its standard deviation accounts
    /// for the correlation between those bigram scores. A bigram containing the key
    /// twice is impossible, so each bigram counts once.
    pub fn key_score(
        &self,
        store: &FeatureStore,
        key: char,
        weighting: KeyWeighting<'_>,
    ) -> Result<ComfortScore, ModelError> {
        let key = key.to_ascii_lowercase();
        let mut total_weight = 0.0;
        let mut aggregate = vec![0.0; self.feature_set.len()];
        for bigram in store.layout().bigrams().into_iter().filter(|b| b.contains(key)) {
            let weight = weighting.weight(bigram);
            if weight <= 0.0 {
                continue;
            }
            let v = store.vector(bigram, &self.feature_set)?;
            for (acc, x) in aggregate.iter_mut().zip(v.values()) {
                *acc += weight * x;
            }
            total_weight += weight;
        }
        if total_weight <= 0.0 {
            return Err(ModelError::EmptyKeyAggregate { key });
        }
        for x in &mut aggregate {
            *x /= total_weight;
        }
        Ok(self.comfort_from_values(&aggregate))
    }

    /// Accuracy, AUC and log loss of population-level predictions on `dataset`.
    pub fn evaluate(
        &self,
        dataset: &PreferenceDataset,
        store: &FeatureStore,
    ) -> Result<Evaluation, FeatureError> {
        let mut probabilities = Vec::with_capacity(dataset.len());
        let mut uncertainties = Vec::with_capacity(dataset.len());
        let mut outcomes = Vec::with_capacity(dataset.len());
        for obs in dataset.observations() {
            let prediction = self.predict_preference(store, obs.bigram_a, obs.bigram_b)?;
            probabilities.push(prediction.probability);
            uncertainties.push(prediction.uncertainty);
            outcomes.push(obs.first_preferred());
        }
        let mean_log_likelihood =
            metrics::mean_log_likelihood(&probabilities, &outcomes).unwrap_or(f64::NAN);
        #[expect(clippy::cast_precision_loss)]
        let mean_uncertainty = if uncertainties.is_empty() {
            f64::NAN
        } else {
            uncertainties.iter().sum::<f64>() / uncertainties.len() as f64
        };
        Ok(Evaluation {
            n_observations: outcomes.len(),
            accuracy: metrics::accuracy(&probabilities, &outcomes).unwrap_or(f64::NAN),
            auc: metrics::auc(&probabilities, &outcomes),
            log_loss: -mean_log_likelihood,
            mean_log_likelihood,
            mean_uncertainty,
        })
    }
}
