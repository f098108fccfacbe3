use keycomfort_core::{BigramError, ConfigError};

/// The feature cache was consulted with a signature that no longer describes the
/// store's contents.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum CacheError {
    #[display(
        "feature signature was computed for layout {found}, but the store now holds layout {expected}"
    )]
    StaleSignature { expected: String, found: String },
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum FeatureError {
    #[display("{_0}")]
    Config(ConfigError),
    #[display("{_0}")]
    Cache(CacheError),
    #[display("bigram '{bigram}' uses key '{key}', which is not part of the layout")]
    #[from(ignore)]
    UnknownKey { bigram: String, key: char },
    #[display("frequency {value} for bigram '{bigram}' must be finite and non-negative")]
    #[from(ignore)]
    InvalidFrequency { bigram: String, value: f64 },
    #[display("invalid bigram in frequency table: {source}")]
    #[from(ignore)]
    InvalidBigram { source: BigramError },
    #[display("failed to read frequency table: {_0}")]
    Csv(csv::Error),
}
