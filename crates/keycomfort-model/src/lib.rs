//! Hierarchical Bayesian model of pairwise bigram preferences.
//!
//! # Overview
//!
//! For an observation where participant `p` compared bigrams `A` and `B`:
//!
//! ```text
//! P(A ≻ B) = sigmoid( β · (f(A) - f(B)) + γ_p )
//! β   ~ Normal(0, feature_prior_scale)       shared feature weights
//! γ_p ~ Normal(0, participant_prior_scale)   per-participant offset
//! ```
//!
//! The participant offset absorbs individual response tendencies, so `β` describes
//! the population. Participants with few observations are pooled toward zero by the
//! shared prior.
//!
//! # Components
//!
//! - [`PreferenceModel`] - validates inputs, builds the log posterior, runs a
//!   [`PosteriorSampler`], and checks convergence
//! - [`HmcSampler`] - built-in Hamiltonian Monte Carlo sampler (parallel chains)
//! - [`TrainedModel`] - posterior summaries with diagnostics; preference
//!   probabilities, comfort scores, key scores and held-out evaluation
//! - [`ScorePredictor`] - comfort export for every bigram and key of a layout
//!
//! # Fit Pipeline
//!
//! ```text
//! ModelConfig::validate, FeatureSet::require_columns, FeatureStore::validate
//!     ↓
//! DesignMatrix (f(A) - f(B) per observation)
//!     ↓
//! HierarchicalLikelihood ──▶ PosteriorSampler::sample (n_chains in parallel)
//!     ↓
//! convergence checks (divergence fraction, split R-hat)
//!     ↓
//! TrainedModel
//! ```
//!
//! Validation happens before sampling, so configuration errors are cheap.

pub use self::{
    config::ModelConfig,
    design::DesignMatrix,
    diagnostics::{ConvergenceDiagnostics, ConvergenceError},
    error::ModelError,
    hmc::HmcSampler,
    likelihood::{HierarchicalLikelihood, LogDensity, sigmoid},
    model::PreferenceModel,
    predictor::{
        Agreement, BigramScore, KeyScore, KeyWeightingKind, ScoreOptions, ScorePredictor,
        ScoreReport,
    },
    sampler::{ChainOutput, PosteriorSampler, SamplerError, SamplerOutput, SamplerSettings},
    trained::{
        ComfortScore, Evaluation, KeyWeighting, ParameterSummary, PreferencePrediction,
        TrainedModel,
    },
};

mod config;
mod design;
mod diagnostics;
mod error;
mod hmc;
mod likelihood;
mod model;
mod predictor;
mod sampler;
#[cfg(test)]
mod test_support;
mod trained;
