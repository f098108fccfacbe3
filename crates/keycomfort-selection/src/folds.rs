//! Participant-level cross-validation folds.
//!
//! Participants, never rows, are assigned to folds, so a participant's judgments are
//! always held out together. Because participants contribute unequal numbers of rows,
//! some folds may hold too few preferences to score reliably; those are merged into a
//! neighboring fold instead of failing.

use keycomfort_core::{ParticipantId, PreferenceDataset};
use rand::{SeedableRng as _, seq::SliceRandom as _};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::{config::SelectionConfig, error::SelectionError};

/// One held-out group of participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub participants: Vec<ParticipantId>,
    /// Held-out row indices, ascending
    pub test_rows: Vec<usize>,
}

impl Fold {
    fn absorb(&mut self, other: Fold) {
        self.participants.extend(other.participants);
        self.test_rows.extend(other.test_rows);
        self.test_rows.sort_unstable();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantFolds {
    folds: Vec<Fold>,
    n_rows: usize,
    /// Number of merges performed to reach the minimum fold size
    merged: usize,
}

impl ParticipantFolds {
    /// Shuffles participants with `config.seed` and deals them round-robin into
    /// `config.n_folds` folds (fewer if there are fewer participants), then merges
    /// folds below `config.min_fold_size` preferences.
    ///
    /// A small fold is merged into the following fold, or into the preceding one when
    /// it is last. Merging stops at two folds; if one of them is still small it is kept
    /// and a warning is logged.
    pub fn new(
        dataset: &PreferenceDataset,
        config: &SelectionConfig,
    ) -> Result<Self, SelectionError> {
        let rows_by_participant = dataset.rows_by_participant();
        let mut participants: Vec<_> = rows_by_participant.keys().cloned().collect();
        if participants.len() < 2 {
            return Err(SelectionError::InsufficientParticipants {
                found: participants.len(),
            });
        }
        let mut rng = Pcg64::seed_from_u64(config.seed);
        participants.shuffle(&mut rng);

        let n_folds = config.n_folds.min(participants.len());
        if n_folds < config.n_folds {
            log::debug!(
                "only {} participants; using {n_folds} folds instead of {}",
                participants.len(),
                config.n_folds
            );
        }
        let mut folds = vec![
            Fold {
                participants: Vec::new(),
                test_rows: Vec::new(),
            };
            n_folds
        ];
        for (i, participant) in participants.into_iter().enumerate() {
            let fold = &mut folds[i % n_folds];
            if let Some(rows) = rows_by_participant.get(&participant) {
                fold.test_rows.extend(rows);
            }
            fold.participants.push(participant);
        }
        for fold in &mut folds {
            fold.test_rows.sort_unstable();
        }

        let mut merged = 0;
        let mut i = 0;
        while i < folds.len() && folds.len() > 2 {
            if folds[i].test_rows.len() >= config.min_fold_size {
                i += 1;
                continue;
            }
            let small = folds.remove(i);
            let target = if i < folds.len() { i } else { i - 1 };
            log::debug!(
                "fold with {} preferences is below {}; merging",
                small.test_rows.len(),
                config.min_fold_size
            );
            folds[target].absorb(small);
            merged += 1;
            i = target;
        }
        if let Some(small) = folds
            .iter()
            .find(|f| f.test_rows.len() < config.min_fold_size)
        {
            log::warn!(
                "a fold holds only {} preferences (minimum {}); no further merging is possible",
                small.test_rows.len(),
                config.min_fold_size
            );
        }

        Ok(Self {
            folds,
            n_rows: dataset.len(),
            merged,
        })
    }

    #[must_use]
    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.folds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    #[must_use]
    pub fn merged(&self) -> usize {
        self.merged
    }

    /// Held-out preferences per fold.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.folds.iter().map(|f| f.test_rows.len()).collect()
    }

    /// Training rows for `fold`: every row not held out by it.
    #[must_use]
    pub fn train_rows(&self, fold: usize) -> Vec<usize> {
        let held_out = &self.folds[fold].test_rows;
        (0..self.n_rows)
            .filter(|row| held_out.binary_search(row).is_err())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::test_support::dataset_with_sizes;

    use super::*;

    fn config(n_folds: usize, min_fold_size: usize) -> SelectionConfig {
        SelectionConfig {
            n_folds,
            min_fold_size,
            ..SelectionConfig::default()
        }
    }

    #[test]
    fn test_folds_partition_participants() {
        let dataset = dataset_with_sizes(&[4; 10]);
        let folds = ParticipantFolds::new(&dataset, &config(5, 1)).unwrap();
        assert_eq!(folds.len(), 5);
        assert_eq!(folds.merged(), 0);
        let mut seen = BTreeSet::new();
        for fold in folds.folds() {
            for p in &fold.participants {
                assert!(seen.insert(p.clone()));
            }
        }
        assert_eq!(seen.len(), 10);
        let total: usize = folds.sizes().iter().sum();
        assert_eq!(total, dataset.len());
    }

    #[test]
    fn test_train_rows_exclude_held_out_participants() {
        let dataset = dataset_with_sizes(&[3, 5, 2, 6]);
        let folds = ParticipantFolds::new(&dataset, &config(2, 1)).unwrap();
        for (i, fold) in folds.folds().iter().enumerate() {
            let train = folds.train_rows(i);
            assert_eq!(train.len() + fold.test_rows.len(), dataset.len());
            for row in train {
                let participant = &dataset.observations()[row].participant;
                assert!(!fold.participants.contains(participant));
            }
        }
    }

    #[test]
    fn test_small_folds_are_merged() {
        // 12 participants with 8 rows each: round-robin into 5 folds gives 24, 24, 16,
        // 16 and 16 held-out rows.
        let dataset = dataset_with_sizes(&[8; 12]);
        let folds = ParticipantFolds::new(&dataset, &config(5, 20)).unwrap();
        assert_eq!(folds.merged(), 2);
        assert_eq!(folds.sizes(), vec![24, 24, 48]);
    }

    #[test]
    fn test_merging_stops_at_two_folds() {
        let dataset = dataset_with_sizes(&[2, 2, 2]);
        let folds = ParticipantFolds::new(&dataset, &config(3, 100)).unwrap();
        assert_eq!(folds.len(), 2);
        assert_eq!(folds.merged(), 1);
    }

    #[test]
    fn test_fold_count_is_capped_by_participants() {
        let dataset = dataset_with_sizes(&[30, 30, 30]);
        let folds = ParticipantFolds::new(&dataset, &config(5, 20)).unwrap();
        assert_eq!(folds.len(), 3);
    }

    #[test]
    fn test_single_participant_is_rejected() {
        let dataset = dataset_with_sizes(&[10]);
        assert!(matches!(
            ParticipantFolds::new(&dataset, &config(5, 1)),
            Err(SelectionError::InsufficientParticipants { found: 1 })
        ));
    }

    #[test]
    fn test_same_seed_same_folds() {
        let dataset = dataset_with_sizes(&[3, 4, 5, 6, 7, 8]);
        let a = ParticipantFolds::new(&dataset, &config(3, 1)).unwrap();
        let b = ParticipantFolds::new(&dataset, &config(3, 1)).unwrap();
        assert_eq!(a, b);
    }
}
