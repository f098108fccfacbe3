use std::time::Duration;

use keycomfort_core::config::{ConfigError, require_nonzero, require_positive};
use serde::{Deserialize, Serialize};

/// Sampling and prior settings for [`PreferenceModel::fit`](crate::PreferenceModel::fit).
///
/// Stored verbatim in every [`TrainedModel`](crate::TrainedModel) so a fit can be
/// reproduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Independent chains, sampled in parallel
    pub n_chains: usize,
    /// Adaptation iterations per chain (discarded)
    pub n_warmup: usize,
    /// Retained draws per chain
    pub n_draws: usize,
    /// Leapfrog steps per iteration are capped at `2^max_tree_depth`
    pub max_tree_depth: u32,
    /// Mean acceptance probability targeted by step-size adaptation
    pub target_accept: f64,
    /// Standard deviation of the normal prior on feature weights
    pub feature_prior_scale: f64,
    /// Standard deviation of the normal prior on participant effects
    pub participant_prior_scale: f64,
    /// Any parameter with split R-hat above this fails the fit
    pub max_rhat: f64,
    /// Divergent transitions above this fraction of draws fail the fit; below it they
    /// are logged as warnings
    pub max_divergence_fraction: f64,
    /// Wall-clock limit for sampling, in seconds
    pub timeout_secs: Option<f64>,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_chains: 4,
            n_warmup: 1000,
            n_draws: 1000,
            max_tree_depth: 10,
            target_accept: 0.8,
            feature_prior_scale: 1.0,
            participant_prior_scale: 1.0,
            max_rhat: 1.01,
            max_divergence_fraction: 0.01,
            timeout_secs: None,
            seed: 42,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("model.n_chains", self.n_chains)?;
        require_nonzero("model.n_warmup", self.n_warmup)?;
        if self.n_draws < 4 {
            return Err(ConfigError::invalid(
                "model.n_draws",
                "at least 4 draws per chain are needed for split R-hat",
            ));
        }
        if !(1..=16).contains(&self.max_tree_depth) {
            return Err(ConfigError::invalid(
                "model.max_tree_depth",
                format!("{} is outside 1..=16", self.max_tree_depth),
            ));
        }
        if !(self.target_accept > 0.0 && self.target_accept < 1.0) {
            return Err(ConfigError::invalid(
                "model.target_accept",
                format!("{} must lie strictly between 0 and 1", self.target_accept),
            ));
        }
        require_positive("model.feature_prior_scale", self.feature_prior_scale)?;
        require_positive("model.participant_prior_scale", self.participant_prior_scale)?;
        if !(self.max_rhat.is_finite() && self.max_rhat >= 1.0) {
            return Err(ConfigError::invalid(
                "model.max_rhat",
                format!("{} must be at least 1.0", self.max_rhat),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_divergence_fraction) {
            return Err(ConfigError::invalid(
                "model.max_divergence_fraction",
                format!("{} must lie in [0, 1]", self.max_divergence_fraction),
            ));
        }
        if let Some(secs) = self.timeout_secs {
            require_positive("model.timeout_secs", secs)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        ModelConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_invalid_values() {
        let config = ModelConfig {
            target_accept: 1.0,
            ..ModelConfig::default()
        };
        assert!(config.validate().is_err());
        let config = ModelConfig {
            feature_prior_scale: 0.0,
            ..ModelConfig::default()
        };
        assert!(config.validate().is_err());
        let config = ModelConfig {
            n_draws: 2,
            ..ModelConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ModelConfig = serde_json::from_str(r#"{"n_chains": 2}"#).unwrap();
        assert_eq!(config.n_chains, 2);
        assert_eq!(config.n_draws, 1000);
    }
}
