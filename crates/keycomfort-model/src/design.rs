//! Observations in model form: feature differences, outcomes, and participant indices.

use std::collections::BTreeMap;

use keycomfort_core::{Bigram, ParticipantId, PreferenceDataset};
use keycomfort_features::{FeatureError, FeatureSet, FeatureStore};

/// One row per observation.
///
/// Row `i` holds `f(A) - f(B)` for the observation's pair as presented, `outcomes[i]`
/// is `true` when `A` was chosen, and `participants[i]` indexes
/// [`DesignMatrix::participant_ids`].
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub outcomes: Vec<bool>,
    pub participants: Vec<usize>,
    pub participant_ids: Vec<ParticipantId>,
}

impl DesignMatrix {
    pub fn build(
        dataset: &PreferenceDataset,
        store: &FeatureStore,
        set: &FeatureSet,
    ) -> Result<Self, FeatureError> {
        let participant_ids = dataset.participants();
        let index: BTreeMap<&ParticipantId, usize> =
            participant_ids.iter().zip(0..).collect();

        let mut vectors: BTreeMap<Bigram, Vec<f64>> = BTreeMap::new();
        for bigram in dataset.bigrams() {
            vectors.insert(bigram, store.vector(bigram, set)?.values().to_vec());
        }

        let mut rows = Vec::with_capacity(dataset.len());
        let mut outcomes = Vec::with_capacity(dataset.len());
        let mut participants = Vec::with_capacity(dataset.len());
        for obs in dataset.observations() {
            let a = &vectors[&obs.bigram_a];
            let b = &vectors[&obs.bigram_b];
            rows.push(a.iter().zip(b).map(|(x, y)| x - y).collect());
            outcomes.push(obs.first_preferred());
            participants.push(index[&obs.participant]);
        }
        Ok(Self {
            columns: set.column_names(),
            rows,
            outcomes,
            participants,
            participant_ids,
        })
    }

    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn n_participants(&self) -> usize {
        self.participant_ids.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
