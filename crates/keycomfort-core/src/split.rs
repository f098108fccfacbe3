//! Participant-disjoint train/test partition.
//!
//! A [`Split`] is created once from a dataset, saved as JSON, and reused by every
//! downstream step. On reload it is checked against the dataset fingerprint so a
//! partition is never applied to data it was not made for.

use std::collections::BTreeSet;

use rand::{SeedableRng as _, seq::SliceRandom as _};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::{dataset::PreferenceDataset, error::DataError, observation::ParticipantId};

/// Realized row fraction may differ from the requested ratio by this much before a
/// warning is logged.
const ROW_FRACTION_TOLERANCE: f64 = 0.05;

/// Participant-level train/test partition of a [`PreferenceDataset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Fingerprint of the dataset this split was computed for
    pub dataset_fingerprint: String,
    pub test_ratio: f64,
    pub seed: u64,
    pub train_participants: BTreeSet<ParticipantId>,
    pub test_participants: BTreeSet<ParticipantId>,
    /// Row indices (sorted) of training observations
    pub train_rows: Vec<usize>,
    /// Row indices (sorted) of test observations
    pub test_rows: Vec<usize>,
}

impl PreferenceDataset {
    /// Assigns whole participants to train or test.
    ///
    /// Participants are sorted, shuffled with `seed`, and the first
    /// `round(n * test_ratio)` (at least 1, at most `n - 1`) go to test. The same
    /// dataset, ratio, and seed always yield the same split.
    pub fn split(&self, test_ratio: f64, seed: u64) -> Result<Split, DataError> {
        if !(test_ratio > 0.0 && test_ratio < 1.0) {
            return Err(DataError::InvalidTestRatio { ratio: test_ratio });
        }
        let mut participants = self.participants();
        let n = participants.len();
        if n < 2 {
            return Err(DataError::InsufficientParticipants { found: n });
        }

        let mut rng = Pcg64::seed_from_u64(seed);
        participants.shuffle(&mut rng);

        #[expect(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let n_test = ((n as f64 * test_ratio).round() as usize).clamp(1, n - 1);
        let test_participants: BTreeSet<_> = participants[..n_test].iter().cloned().collect();
        let train_participants: BTreeSet<_> = participants[n_test..].iter().cloned().collect();

        let (test_rows, train_rows): (Vec<usize>, Vec<usize>) = (0..self.len())
            .partition(|&i| test_participants.contains(&self.observations()[i].participant));

        let split = Split {
            dataset_fingerprint: self.fingerprint(),
            test_ratio,
            seed,
            train_participants,
            test_participants,
            train_rows,
            test_rows,
        };
        let deviation = split.row_fraction_deviation();
        if deviation > ROW_FRACTION_TOLERANCE {
            log::warn!(
                "test rows make up {:.3} of the data, requested {test_ratio:.3}; \
                 participants contribute unequal numbers of preferences",
                split.realized_test_fraction()
            );
        }
        log::info!(
            "split {} participants into {} train / {} test ({} / {} rows)",
            n,
            split.train_participants.len(),
            split.test_participants.len(),
            split.train_rows.len(),
            split.test_rows.len()
        );
        Ok(split)
    }
}

impl Split {
    /// Fraction of rows assigned to test.
    #[must_use]
    pub fn realized_test_fraction(&self) -> f64 {
        let total = self.train_rows.len() + self.test_rows.len();
        if total == 0 {
            return 0.0;
        }
        #[expect(clippy::cast_precision_loss)]
        let fraction = self.test_rows.len() as f64 / total as f64;
        fraction
    }

    /// Fraction of participants assigned to test.
    #[must_use]
    pub fn participant_test_fraction(&self) -> f64 {
        let total = self.train_participants.len() + self.test_participants.len();
        if total == 0 {
            return 0.0;
        }
        #[expect(clippy::cast_precision_loss)]
        let fraction = self.test_participants.len() as f64 / total as f64;
        fraction
    }

    /// Absolute difference between the realized test row fraction and the requested
    /// ratio.
    #[must_use]
    pub fn row_fraction_deviation(&self) -> f64 {
        (self.realized_test_fraction() - self.test_ratio).abs()
    }

    /// Checks that this split belongs to `dataset` and is a disjoint, complete
    /// participant partition of it.
    pub fn verify(&self, dataset: &PreferenceDataset) -> Result<(), DataError> {
        let found = dataset.fingerprint();
        if found != self.dataset_fingerprint {
            return Err(DataError::SplitFingerprintMismatch {
                expected: self.dataset_fingerprint.clone(),
                found,
            });
        }
        if let Some(p) = self
            .train_participants
            .intersection(&self.test_participants)
            .next()
        {
            return Err(DataError::SplitParticipantOverlap {
                participant: p.to_string(),
            });
        }

        let mut seen = vec![false; dataset.len()];
        for (rows, participants) in [
            (&self.train_rows, &self.train_participants),
            (&self.test_rows, &self.test_participants),
        ] {
            for &row in rows {
                let obs = dataset
                    .observations()
                    .get(row)
                    .ok_or(DataError::IndexOutOfRange {
                        index: row,
                        len: dataset.len(),
                    })?;
                if seen[row] || !participants.contains(&obs.participant) {
                    return Err(DataError::SplitCoverage { row });
                }
                seen[row] = true;
            }
        }
        if let Some(row) = seen.iter().position(|covered| !covered) {
            return Err(DataError::SplitCoverage { row });
        }
        Ok(())
    }

    /// Verifies the split and materializes `(train, test)` datasets.
    pub fn apply(
        &self,
        dataset: &PreferenceDataset,
    ) -> Result<(PreferenceDataset, PreferenceDataset), DataError> {
        self.verify(dataset)?;
        Ok((
            dataset.subset(&self.train_rows)?,
            dataset.subset(&self.test_rows)?,
        ))
    }
}
