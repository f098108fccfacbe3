use keycomfort_core::config::{ConfigError, require_nonzero};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Participant folds requested before merging
    pub n_folds: usize,
    /// Folds with fewer held-out preferences are merged into a neighbor
    pub min_fold_size: usize,
    /// A candidate is accepted only if its median improvement is strictly above this
    pub importance_threshold: f64,
    /// Seed for the participant shuffle
    pub seed: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            min_fold_size: 20,
            importance_threshold: 0.0,
            seed: 42,
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_folds < 2 {
            return Err(ConfigError::invalid(
                "selection.n_folds",
                format!("{} folds cannot cross-validate; at least 2 are needed", self.n_folds),
            ));
        }
        require_nonzero("selection.min_fold_size", self.min_fold_size)?;
        if !self.importance_threshold.is_finite() {
            return Err(ConfigError::invalid(
                "selection.importance_threshold",
                "must be finite",
            ));
        }
        Ok(())
    }
}
