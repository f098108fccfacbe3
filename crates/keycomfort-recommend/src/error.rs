use keycomfort_core::ConfigError;
use keycomfort_features::FeatureError;
use keycomfort_model::ModelError;

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum RecommendationError {
    #[display("{_0}")]
    Config(ConfigError),
    #[display("{_0}")]
    Feature(FeatureError),
    #[display("{_0}")]
    Model(ModelError),
    #[display(
        "no candidate pairs remain: all {total_pairs} pairs of {n_bigrams} bigrams are already observed"
    )]
    #[from(ignore)]
    EmptyCandidatePool { n_bigrams: usize, total_pairs: usize },
    #[display(
        "candidate pool of {pairs} pairs has {probabilities} probabilities and {points} projected points"
    )]
    #[from(ignore)]
    MismatchedPool {
        pairs: usize,
        probabilities: usize,
        points: usize,
    },
    #[display("feature vectors have no dimensions to project")]
    #[from(ignore)]
    EmptyProjection,
}
