use keycomfort_core::{PreferenceDataset, RawPreferenceRow};
use keycomfort_features::{FeatureStore, Layout, source::all_bigram_feature_sources};
use keycomfort_model::{
    ChainOutput, LogDensity, ModelConfig, PosteriorSampler, PreferenceModel, SamplerError,
    SamplerOutput, SamplerSettings,
};
use rand::{Rng as _, SeedableRng as _};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;

use crate::config::SelectionConfig;

/// Same-finger bigram paired with a bigram that differs from it only in finger usage:
/// row span and home-row count are equal within each pair.
const PAIRS: [(&str, &str); 6] = [
    ("qa", "qs"),
    ("ed", "es"),
    ("ws", "wd"),
    ("rf", "rd"),
    ("za", "zs"),
    ("xs", "xd"),
];

fn row(participant: &str, a: &str, b: &str, chosen: &str) -> RawPreferenceRow {
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

/// Participant `i` contributes `sizes[i]` rows; every row avoids the same-finger
/// bigram, alternating which side it is shown on.
pub(crate) fn dataset_with_sizes(sizes: &[usize]) -> PreferenceDataset {
    let mut rows = Vec::new();
    for (p, &n) in sizes.iter().enumerate() {
        let participant = format!("P{p:02}");
        for i in 0..n {
            let (same, other) = PAIRS[(p + i) % PAIRS.len()];
            if i % 2 == 0 {
                rows.push(row(&participant, same, other, other));
            } else {
                rows.push(row(&participant, other, same, other));
            }
        }
    }
    PreferenceDataset::load("synthetic", rows).unwrap()
}

pub(crate) fn same_finger_dataset(participants: usize, rows_each: usize) -> PreferenceDataset {
    dataset_with_sizes(&vec![rows_each; participants])
}

pub(crate) fn store() -> FeatureStore {
    FeatureStore::new(Layout::qwerty_left(), all_bigram_feature_sources(None)).unwrap()
}

pub(crate) fn selection_config() -> SelectionConfig {
    SelectionConfig {
        n_folds: 5,
        min_fold_size: 20,
        importance_threshold: 0.01,
        seed: 7,
    }
}

pub(crate) fn fast_model() -> PreferenceModel<MapSampler> {
    let config = ModelConfig {
        n_chains: 2,
        n_warmup: 1,
        n_draws: 200,
        max_rhat: 1.1,
        ..ModelConfig::default()
    };
    PreferenceModel::with_sampler(config, MapSampler)
}

/// Finds the posterior mode by gradient ascent and returns independent draws from a
/// narrow normal around it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MapSampler;

impl MapSampler {
    fn mode(target: &dyn LogDensity) -> Vec<f64> {
        let dim = target.dim();
        let mut x = vec![0.0; dim];
        let mut grad = vec![0.0; dim];
        let mut next_grad = vec![0.0; dim];
        let mut log_p = target.log_density_and_gradient(&x, &mut grad);
        let mut step = 0.1;
        for _ in 0..2000 {
            let next: Vec<f64> = x.iter().zip(&grad).map(|(x, g)| x + step * g).collect();
            let next_log_p = target.log_density_and_gradient(&next, &mut next_grad);
            if next_log_p >= log_p {
                x = next;
                log_p = next_log_p;
                std::mem::swap(&mut grad, &mut next_grad);
                step *= 1.2;
            } else {
                step *= 0.5;
            }
        }
        x
    }
}

impl PosteriorSampler for MapSampler {
    fn sample(
        &self,
        target: &dyn LogDensity,
        settings: &SamplerSettings,
    ) -> Result<SamplerOutput, SamplerError> {
        let mode = Self::mode(target);
        let chains = (0..settings.n_chains)
            .zip(0u64..)
            .map(|(_, offset)| {
                let mut rng = Pcg64::seed_from_u64(settings.seed.wrapping_add(offset));
                let draws = (0..settings.n_draws)
                    .map(|_| {
                        mode.iter()
                            .map(|m| m + 0.01 * rng.sample::<f64, _>(StandardNormal))
                            .collect()
                    })
                    .collect();
                ChainOutput {
                    draws,
                    divergences: 0,
                    tree_depth_hits: 0,
                    step_size: 0.0,
                    mean_accept: 1.0,
                }
            })
            .collect();
        Ok(SamplerOutput { chains })
    }
}
