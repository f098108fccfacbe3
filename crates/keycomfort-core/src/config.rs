/// Invalid configuration, detected before any feature extraction or sampling.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("feature set contains no features")]
    EmptyFeatureSet,
    #[display("feature '{feature}' is declared more than once")]
    DuplicateFeature { feature: String },
    #[display("interaction '{interaction}' references undeclared base feature '{feature}'")]
    UndeclaredInteractionFeature { interaction: String, feature: String },
    #[display("interaction '{interaction}' needs at least two distinct base features")]
    InteractionArity { interaction: String },
    #[display("unknown feature '{feature}'")]
    UnknownFeature { feature: String },
    #[display(
        "recommendation weights must sum to 1.0 (information {information}, coverage {coverage})"
    )]
    RecommendationWeights { information: f64, coverage: f64 },
    #[display("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Checks `value > 0`, reporting `field` otherwise.
pub fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} must be positive")))
    }
}

/// Checks `value >= 1`, reporting `field` otherwise.
pub fn require_nonzero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be at least 1"))
    }
}
