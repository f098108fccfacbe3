//! Comfort-score export for every bigram and key of a layout.

use std::collections::BTreeMap;

use keycomfort_core::{Bigram, ConfigError, PreferenceDataset};
use keycomfort_features::{BigramFrequencies, FeatureStore};
use serde::{Deserialize, Serialize};

use crate::{
    error::ModelError,
    trained::{ComfortScore, KeyWeighting, TrainedModel},
};

/// Left-hand QWERTY keys and their mirror images on the right hand.
const MIRROR_LEFT: &str = "qwertasdfgzxcvb";
const MIRROR_RIGHT: &str = "poiuy;lkjh/.,mn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyWeightingKind {
    /// Weight bigrams by corpus frequency (requires a frequency table)
    #[default]
    Frequency,
    Uniform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreOptions {
    /// Add min-max normalized scores in `[0, 1]`
    pub normalize: bool,
    /// Copy left-hand scores onto the mirrored right-hand keys
    pub mirror_to_right_hand: bool,
    pub key_weighting: KeyWeightingKind,
}

impl Default for ScoreOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            mirror_to_right_hand: false,
            key_weighting: KeyWeightingKind::Frequency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigramScore {
    pub bigram: String,
    pub mean: f64,
    pub std_dev: f64,
    pub normalized: Option<f64>,
    /// Bigram whose score was copied, for mirrored entries
    pub mirrored_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyScore {
    pub key: char,
    pub mean: f64,
    pub std_dev: f64,
    pub normalized: Option<f64>,
    pub mirrored_from: Option<char>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub layout: String,
    pub key_weighting: KeyWeightingKind,
    pub bigrams: Vec<BigramScore>,
    pub keys: Vec<KeyScore>,
    /// Layout keys without a key score, because none of their bigrams has weight
    #[serde(default)]
    pub skipped_keys: Vec<char>,
}

/// How often the chosen bigram of a held-out preference scores higher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    pub n_observations: usize,
    pub agreed: usize,
    pub fraction: f64,
}

fn mirror(key: char) -> Option<char> {
    MIRROR_LEFT
        .chars()
        .position(|c| c == key)
        .and_then(|i| MIRROR_RIGHT.chars().nth(i))
}

/// Min-max scaling to `[0, 1]`; all values map to 0.5 when they are equal.
fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    values
        .iter()
        .map(|v| if range > 0.0 { (v - min) / range } else { 0.5 })
        .collect()
}

/// Applies a [`TrainedModel`] to every bigram and key of the store's layout.
#[derive(Debug)]
pub struct ScorePredictor<'a> {
    model: &'a TrainedModel,
    store: &'a FeatureStore,
    frequencies: Option<&'a BigramFrequencies>,
}

impl<'a> ScorePredictor<'a> {
    #[must_use]
    pub fn new(
        model: &'a TrainedModel,
        store: &'a FeatureStore,
        frequencies: Option<&'a BigramFrequencies>,
    ) -> Self {
        Self {
            model,
            store,
            frequencies,
        }
    }

    fn weighting(&self, kind: KeyWeightingKind) -> Result<KeyWeighting<'a>, ConfigError> {
        match (kind, self.frequencies) {
            (KeyWeightingKind::Uniform, _) => Ok(KeyWeighting::Uniform),
            (KeyWeightingKind::Frequency, Some(table)) => Ok(KeyWeighting::Frequency(table)),
            (KeyWeightingKind::Frequency, None) => Err(ConfigError::invalid(
                "scores.key_weighting",
                "frequency weighting needs a bigram frequency table",
            )),
        }
    }

    pub fn bigram_scores(&self) -> Result<Vec<(Bigram, ComfortScore)>, ModelError> {
        self.store
            .layout()
            .bigrams()
            .into_iter()
            .map(|b| Ok((b, self.model.comfort_score(self.store, b)?)))
            .collect()
    }

    /// Scores every layout bigram and key.
    ///
    /// Keys whose bigrams all have zero frequency are left out of the key table under
    /// frequency weighting and listed in [`ScoreReport::skipped_keys`].
    pub fn predict(&self, options: &ScoreOptions) -> Result<ScoreReport, ModelError> {
        let weighting = self.weighting(options.key_weighting)?;

        let bigram_scores = self.bigram_scores()?;
        let bigram_norm = options
            .normalize
            .then(|| normalize(&bigram_scores.iter().map(|(_, s)| s.mean).collect::<Vec<_>>()));
        let mut bigrams: Vec<BigramScore> = bigram_scores
            .iter()
            .enumerate()
            .map(|(i, (b, s))| BigramScore {
                bigram: b.to_string(),
                mean: s.mean,
                std_dev: s.std_dev,
                normalized: bigram_norm.as_ref().map(|n| n[i]),
                mirrored_from: None,
            })
            .collect();

        let mut key_scores = Vec::new();
        let mut skipped_keys = Vec::new();
        for position in self.store.layout().keys() {
            match self.model.key_score(self.store, position.key, weighting) {
                Ok(score) => key_scores.push((position.key, score)),
                Err(ModelError::EmptyKeyAggregate { key }) => {
                    log::warn!("key '{key}' has no weighted bigrams; skipping");
                    skipped_keys.push(key);
                }
                Err(e) => return Err(e),
            }
        }
        let key_norm = options
            .normalize
            .then(|| normalize(&key_scores.iter().map(|(_, s)| s.mean).collect::<Vec<_>>()));
        let mut keys: Vec<KeyScore> = key_scores
            .iter()
            .enumerate()
            .map(|(i, (k, s))| KeyScore {
                key: *k,
                mean: s.mean,
                std_dev: s.std_dev,
                normalized: key_norm.as_ref().map(|n| n[i]),
                mirrored_from: None,
            })
            .collect();

        if options.mirror_to_right_hand {
            let mirrored_bigrams: Vec<BigramScore> = bigrams
                .iter()
                .filter_map(|score| {
                    let mut chars = score.bigram.chars();
                    let (a, b) = (chars.next()?, chars.next()?);
                    let target = Bigram::new(mirror(a)?, mirror(b)?).ok()?;
                    Some(BigramScore {
                        bigram: target.to_string(),
                        mirrored_from: Some(score.bigram.clone()),
                        ..score.clone()
                    })
                })
                .collect();
            let mirrored_keys: Vec<KeyScore> = keys
                .iter()
                .filter_map(|score| {
                    Some(KeyScore {
                        key: mirror(score.key)?,
                        mirrored_from: Some(score.key),
                        ..score.clone()
                    })
                })
                .collect();
            bigrams.extend(mirrored_bigrams);
            keys.extend(mirrored_keys);
        }

        Ok(ScoreReport {
            layout: self.store.layout().name.clone(),
            key_weighting: options.key_weighting,
            bigrams,
            keys,
            skipped_keys,
        })
    }

    /// Fraction of `dataset` preferences whose chosen bigram has the higher comfort
    /// mean. Ties count as disagreement.
    pub fn agreement(&self, dataset: &PreferenceDataset) -> Result<Agreement, ModelError> {
        let mut cache: BTreeMap<Bigram, f64> = BTreeMap::new();
        let mut comfort = |b: Bigram| -> Result<f64, ModelError> {
            if let Some(&m) = cache.get(&b) {
                return Ok(m);
            }
            let m = self.model.comfort_score(self.store, b)?.mean;
            cache.insert(b, m);
            Ok(m)
        };
        let mut agreed = 0;
        for obs in dataset.observations() {
            if comfort(obs.chosen())? > comfort(obs.rejected())? {
                agreed += 1;
            }
        }
        let n = dataset.len();
        #[expect(clippy::cast_precision_loss)]
        let fraction = if n == 0 { 0.0 } else { agreed as f64 / n as f64 };
        Ok(Agreement {
            n_observations: n,
            agreed,
            fraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_table() {
        assert_eq!(mirror('q'), Some('p'));
        assert_eq!(mirror('g'), Some('h'));
        assert_eq!(mirror('b'), Some('n'));
        assert_eq!(mirror('p'), None);
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize(&[1.0, 3.0, 2.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(normalize(&[2.0, 2.0]), vec![0.5, 0.5]);
    }
}

#[cfg(test)]
mod fitted_tests {
    use crate::test_support::{fitted, qa_sd_dataset};

    use super::*;

    #[test]
    fn test_predict_all_layout_bigrams() {
        let (model, store) = fitted();
        let predictor = ScorePredictor::new(&model, &store, None);
        let options = ScoreOptions {
            key_weighting: KeyWeightingKind::Uniform,
            ..ScoreOptions::default()
        };
        let report = predictor.predict(&options).unwrap();
        assert_eq!(report.bigrams.len(), 15 * 14);
        assert_eq!(report.keys.len(), 15);
        assert!(report.skipped_keys.is_empty());
        assert!(report.bigrams.iter().all(|b| {
            let n = b.normalized.unwrap();
            (0.0..=1.0).contains(&n)
        }));
    }

    #[test]
    fn test_mirroring_doubles_entries() {
        let (model, store) = fitted();
        let predictor = ScorePredictor::new(&model, &store, None);
        let options = ScoreOptions {
            mirror_to_right_hand: true,
            key_weighting: KeyWeightingKind::Uniform,
            ..ScoreOptions::default()
        };
        let report = predictor.predict(&options).unwrap();
        assert_eq!(report.bigrams.len(), 2 * 15 * 14);
        assert_eq!(report.keys.len(), 30);
        let sd = report.bigrams.iter().find(|b| b.bigram == "sd").unwrap();
        let lk = report.bigrams.iter().find(|b| b.bigram == "lk").unwrap();
        assert_eq!(lk.mirrored_from.as_deref(), Some("sd"));
        assert_eq!(lk.mean, sd.mean);
        let q = report.keys.iter().find(|k| k.key == 'q').unwrap();
        let p = report.keys.iter().find(|k| k.key == 'p').unwrap();
        assert_eq!(p.mirrored_from, Some('q'));
        assert_eq!(p.mean, q.mean);
    }

    #[test]
    fn test_keys_without_frequencies_are_reported() {
        let (model, store) = fitted();
        let qa: Bigram = "qa".parse().unwrap();
        let table = BigramFrequencies::new([(qa, 5.0)]).unwrap();
        let predictor = ScorePredictor::new(&model, &store, Some(&table));
        let report = predictor.predict(&ScoreOptions::default()).unwrap();
        let scored: Vec<char> = report.keys.iter().map(|k| k.key).collect();
        assert_eq!(scored, ['q', 'a']);
        assert_eq!(report.skipped_keys.len(), 13);
        assert!(report.skipped_keys.contains(&'z'));
        assert!(!report.skipped_keys.contains(&'q'));
    }

    #[test]
    fn test_frequency_weighting_requires_table() {
        let (model, store) = fitted();
        let predictor = ScorePredictor::new(&model, &store, None);
        assert!(matches!(
            predictor.predict(&ScoreOptions::default()),
            Err(ModelError::Config(_))
        ));
    }

    #[test]
    fn test_agreement_with_majority() {
        let (model, store) = fitted();
        let predictor = ScorePredictor::new(&model, &store, None);
        let agreement = predictor.agreement(&qa_sd_dataset()).unwrap();
        assert_eq!(agreement.n_observations, 11);
        assert_eq!(agreement.agreed, 10);
    }
}
