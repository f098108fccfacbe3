use keycomfort_core::{PreferenceDataset, RawPreferenceRow};
use keycomfort_features::{FeatureSet, FeatureStore, Layout, source::all_bigram_feature_sources};

use crate::{config::ModelConfig, model::PreferenceModel, trained::TrainedModel};

pub(crate) fn row(participant: &str, a: &str, b: &str, chosen: &str) -> RawPreferenceRow {
    RawPreferenceRow {
        participant: Some(participant.to_owned()),
        bigram1: a.to_owned(),
        bigram2: b.to_owned(),
        chosen_bigram: chosen.to_owned(),
        bigram1_time: None,
        bigram2_time: None,
        strength: None,
    }
}

/// Ten "qa over sd" judgments from P1 and one "sd over qa" from P2.
pub(crate) fn qa_sd_dataset() -> PreferenceDataset {
    let mut rows: Vec<_> = (0..10).map(|_| row("P1", "qa", "sd", "qa")).collect();
    rows.push(row("P2", "sd", "qa", "sd"));
    PreferenceDataset::load("qa-sd", rows).unwrap()
}

pub(crate) fn store() -> FeatureStore {
    FeatureStore::new(Layout::qwerty_left(), all_bigram_feature_sources(None)).unwrap()
}

pub(crate) fn same_finger_set() -> FeatureSet {
    FeatureSet::new(vec!["same_finger".to_owned()], Vec::new(), Vec::new()).unwrap()
}

/// Short, fast configuration with a threshold suited to short chains.
pub(crate) fn quick_config() -> ModelConfig {
    ModelConfig {
        n_chains: 2,
        n_warmup: 300,
        n_draws: 400,
        max_rhat: 1.1,
        ..ModelConfig::default()
    }
}

pub(crate) fn fitted() -> (TrainedModel, FeatureStore) {
    let store = store();
    let model = PreferenceModel::new(quick_config())
        .fit(&qa_sd_dataset(), &store, &same_finger_set())
        .unwrap();
    (model, store)
}
