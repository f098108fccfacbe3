use std::path::PathBuf;

use keycomfort_core::{ConfigError, MergePolicy};
use keycomfort_features::FeatureSet;
use keycomfort_model::{ModelConfig, ScoreOptions};
use keycomfort_recommend::RecommendationConfig;
use keycomfort_selection::SelectionConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.test_ratio > 0.0 && self.test_ratio < 1.0 {
            Ok(())
        } else {
            Err(ConfigError::invalid(
                "split.test_ratio",
                format!("{} must lie strictly between 0 and 1", self.test_ratio),
            ))
        }
    }
}

/// Pipeline configuration file shared by every mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Declared base features, interactions, and controls
    pub features: FeatureSet,
    /// Keyboard layout JSON; the left-hand QWERTY block when absent
    pub layout: Option<PathBuf>,
    /// `bigram,frequency` CSV enabling the `bigram_frequency` source and frequency
    /// weighting of key scores
    pub frequencies: Option<PathBuf>,
    /// How participants of `--extra-data` relate to those of `--data`
    pub merge: Option<MergePolicy>,
    pub split: SplitConfig,
    pub selection: SelectionConfig,
    pub model: ModelConfig,
    pub recommendation: RecommendationConfig,
    pub scores: ScoreOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.split.validate().is_ok());
    }

    #[test]
    fn test_sections_parse() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "features": {
                    "base": ["same_finger", "row_span"],
                    "interactions": [["same_finger", "row_span"]],
                    "controls": ["bigram_frequency"]
                },
                "frequencies": "freq.csv",
                "merge": {"distinct_sources": {"left_tag": "a", "right_tag": "b"}},
                "model": {"n_chains": 2},
                "recommendation": {"information_weight": 0.3, "coverage_weight": 0.7},
                "scores": {"key_weighting": "uniform"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.features.len(), 4);
        assert_eq!(config.model.n_chains, 2);
        assert_eq!(config.model.n_draws, 1000);
        assert!(config.recommendation.validate().is_ok());
        assert!(matches!(
            config.merge,
            Some(MergePolicy::DistinctSources { .. })
        ));
    }

    #[test]
    fn test_interaction_closure_is_checked_on_load() {
        let result: Result<PipelineConfig, _> = serde_json::from_str(
            r#"{"features": {"base": ["same_finger"], "interactions": [["same_finger", "row_span"]]}}"#,
        );
        assert!(result.is_err());
    }
}
