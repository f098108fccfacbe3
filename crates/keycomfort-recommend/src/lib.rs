//! Active-learning recommendations: which bigram pairs to compare next.
//!
//! # Procedure
//!
//! 1. **Candidate pool** - every unordered pair of layout bigrams that has not been
//!    compared yet; pools above `max_candidates` are subsampled with a fixed seed.
//! 2. **Projection** - each pair is represented by the difference of its bigrams'
//!    feature vectors and projected onto a few principal components, fitted over the
//!    candidates and the already observed pairs.
//! 3. **Scoring** - two components in `[0, 1]`, mixed by weights that sum to 1:
//!    - *information value*: binary entropy (in bits) of the model's predicted
//!      preference probability, highest for pairs the model is least sure about. This
//!      is a proximity-to-the-decision-boundary heuristic, not an expected information
//!      gain. Without a model every pair has information value 1.
//!    - *coverage value*: distance from the pair to the nearest observed or already
//!      selected pair, relative to the farthest remaining candidate.
//! 4. **Greedy max-min selection** - pick the best-scoring candidate, update coverage,
//!    repeat. Ties go to the lowest candidate index.
//!
//! Greedy max-min selection approximates an NP-hard diversity problem; each pick is
//! optimal for its step, the overall selection is not guaranteed to be.

pub use self::{
    config::RecommendationConfig,
    engine::{
        CandidateScore, Recommendation, RecommendationEngine, RecommendationReport, ScoredPool,
        fit_for_recommendation, information_value,
    },
    error::RecommendationError,
    pool::candidate_pool,
    projection::{PairProjection, pair_distance},
};

mod config;
mod engine;
mod error;
mod pool;
mod projection;
