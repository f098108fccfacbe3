use keycomfort_core::{ConfigError, DataError};
use keycomfort_features::FeatureError;

use crate::{diagnostics::ConvergenceError, sampler::SamplerError};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ModelError {
    #[display("{_0}")]
    Config(ConfigError),
    #[display("{_0}")]
    Data(DataError),
    #[display("{_0}")]
    Feature(FeatureError),
    #[display("fit did not converge: {_0}")]
    Convergence(ConvergenceError),
    #[display("{_0}")]
    Sampler(SamplerError),
    #[display("no bigram containing key '{key}' carries positive weight")]
    #[from(ignore)]
    EmptyKeyAggregate { key: char },
}

impl ModelError {
    /// Returns `true` when sampling stopped at the configured wall-clock limit.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Sampler(SamplerError::Timeout { .. }))
    }
}
