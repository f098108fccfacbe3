use keycomfort_core::{ConfigError, DataError};
use keycomfort_model::ModelError;

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum SelectionError {
    #[display("{_0}")]
    Config(ConfigError),
    #[display("{_0}")]
    Data(DataError),
    #[display("cross-validation needs at least 2 participants, found {found}")]
    #[from(ignore)]
    InsufficientParticipants { found: usize },
    #[display("fold {fold} failed while fitting [{features}]: {source}")]
    #[from(ignore)]
    Fold {
        fold: usize,
        features: String,
        source: ModelError,
    },
    #[display("evaluation of fold {fold} panicked")]
    #[from(ignore)]
    FoldPanicked { fold: usize },
}
