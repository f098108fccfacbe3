use chrono::{DateTime, Utc};
use keycomfort_model::{Evaluation, TrainedModel};
use serde::{Deserialize, Serialize};

/// Trained-model file written by `train-model` and read by `recommend-pairs` and
/// `predict-scores`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelArtifact {
    pub trained_at: DateTime<Utc>,
    pub layout: String,
    /// Fingerprint of the dataset the model was fitted on
    pub training_data: String,
    /// Fingerprint recorded in the split, when one was used
    pub split: Option<String>,
    pub held_out: Option<Evaluation>,
    pub model: TrainedModel,
}
