use keycomfort_core::config::{ConfigError, require_nonzero};
use serde::{Deserialize, Serialize};

/// Allowed deviation of `information_weight + coverage_weight` from 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub n_recommendations: usize,
    /// Larger candidate pools are subsampled with `seed`
    pub max_candidates: usize,
    pub information_weight: f64,
    pub coverage_weight: f64,
    /// Principal components of the projected feature space
    pub n_components: usize,
    pub seed: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            n_recommendations: 30,
            max_candidates: 10_000,
            information_weight: 0.5,
            coverage_weight: 0.5,
            n_components: 2,
            seed: 42,
        }
    }
}

impl RecommendationConfig {
    /// Checks sizes and that both weights are non-negative and sum to 1.0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("recommendation.n_recommendations", self.n_recommendations)?;
        require_nonzero("recommendation.max_candidates", self.max_candidates)?;
        require_nonzero("recommendation.n_components", self.n_components)?;
        let (information, coverage) = (self.information_weight, self.coverage_weight);
        let valid = information.is_finite()
            && coverage.is_finite()
            && information >= 0.0
            && coverage >= 0.0
            && (information + coverage - 1.0).abs() <= WEIGHT_SUM_TOLERANCE;
        if !valid {
            return Err(ConfigError::RecommendationWeights {
                information,
                coverage,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RecommendationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let config = RecommendationConfig {
            information_weight: 0.7,
            coverage_weight: 0.7,
            ..RecommendationConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::RecommendationWeights {
                information: 0.7,
                coverage: 0.7
            })
        );
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let config = RecommendationConfig {
            information_weight: 1.5,
            coverage_weight: -0.5,
            ..RecommendationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RecommendationWeights { .. })
        ));
    }

    #[test]
    fn test_single_component_weight_is_allowed() {
        let config = RecommendationConfig {
            information_weight: 0.0,
            coverage_weight: 1.0,
            ..RecommendationConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RecommendationConfig =
            serde_json::from_str(r#"{"n_recommendations": 5, "seed": 3}"#).unwrap();
        assert_eq!(config.n_recommendations, 5);
        assert_eq!(config.seed, 3);
        assert_eq!(config.max_candidates, 10_000);
        assert!(config.validate().is_ok());
    }
}
