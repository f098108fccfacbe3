//! Cross-validated forward feature selection.
//!
//! Candidates are the base features and interactions of a declared
//! [`FeatureSet`](keycomfort_features::FeatureSet). Selection runs in rounds:
//!
//! 1. Every eligible candidate (interactions only once all their components are
//!    accepted) is scored by participant-level k-fold cross-validation: the model is
//!    fitted with and without the candidate on the training participants of each fold,
//!    and the held-out mean log-likelihood gain is recorded.
//! 2. The candidate with the highest median gain is accepted if the gain exceeds
//!    `importance_threshold`; ties go to the earlier declared candidate.
//! 3. Rounds repeat until one accepts nothing or no eligible candidate is left.
//!
//! Because importance is always measured relative to the current accepted set, of two
//! correlated features only the first admitted one shows large importance.
//!
//! Control features are part of every fitted set but are never scored.
//!
//! The accepted set is carried in an explicit [`SelectionState`], so single rounds can
//! be run and replayed with [`FeatureSelector::run_round`].

pub use self::{
    config::SelectionConfig,
    error::SelectionError,
    folds::{Fold, ParticipantFolds},
    importance::{CandidateImportance, FoldGain, FoldScore},
    selector::{
        FeatureRecord, FeatureSelector, FoldSummary, ImportanceReport, RoundRecord,
        SelectionReport, SelectionState,
    },
};

mod config;
mod error;
mod folds;
mod importance;
mod selector;
#[cfg(test)]
mod test_support;
