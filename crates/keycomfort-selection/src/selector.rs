use keycomfort_core::{ConfigError, PreferenceDataset};
use keycomfort_features::{Candidate, FeatureSet, FeatureStore};
use keycomfort_model::{HmcSampler, PosteriorSampler, PreferenceModel};
use serde::{Deserialize, Serialize};

use crate::{
    config::SelectionConfig,
    error::SelectionError,
    folds::ParticipantFolds,
    importance::{self, CandidateImportance},
};

/// Accepted features and pending candidates between selection rounds.
///
/// Each round consumes a state and returns the next one, so any round can be replayed
/// from a recorded state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    /// Rounds completed so far
    pub round: usize,
    /// Controls plus every accepted candidate, in acceptance order
    pub accepted: FeatureSet,
    /// Candidates not yet accepted, in declaration order
    pub pending: Vec<Candidate>,
    pub finished: bool,
}

impl SelectionState {
    /// Starting state: only the controls of `declared` are accepted.
    pub fn initial(declared: &FeatureSet) -> Result<Self, ConfigError> {
        let accepted = FeatureSet::controls_only(declared.controls().to_vec())?;
        let pending = declared.candidates();
        Ok(Self {
            round: 0,
            accepted,
            finished: pending.is_empty(),
            pending,
        })
    }

    /// Pending candidates whose required base features are all accepted.
    #[must_use]
    pub fn eligible(&self) -> Vec<&Candidate> {
        self.pending
            .iter()
            .filter(|c| {
                c.requirements()
                    .iter()
                    .all(|r| self.accepted.base().contains(r))
            })
            .collect()
    }
}

/// Outcome of one selection round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 1-based round number
    pub round: usize,
    /// Columns of the set every candidate was compared against
    pub baseline: Vec<String>,
    pub candidates: Vec<CandidateImportance>,
    pub accepted: Option<String>,
}

/// Importance history of one declared candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub feature: String,
    /// Round in which the feature was accepted
    pub accepted_round: Option<usize>,
    /// `(round, importance)` for every round the feature was scored in
    pub importance_by_round: Vec<(usize, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldSummary {
    pub n_folds: usize,
    pub merged: usize,
    pub sizes: Vec<usize>,
}

impl From<&ParticipantFolds> for FoldSummary {
    fn from(folds: &ParticipantFolds) -> Self {
        Self {
            n_folds: folds.len(),
            merged: folds.merged(),
            sizes: folds.sizes(),
        }
    }
}

/// Result of [`FeatureSelector::select`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub selected: FeatureSet,
    pub folds: FoldSummary,
    pub rounds: Vec<RoundRecord>,
    pub features: Vec<FeatureRecord>,
}

/// Result of [`FeatureSelector::analyze_importance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceReport {
    pub folds: FoldSummary,
    pub controls: Vec<String>,
    pub candidates: Vec<CandidateImportance>,
}

/// Greedy forward selection over the candidates of a declared feature set.
#[derive(Debug, Clone)]
pub struct FeatureSelector<S = HmcSampler> {
    declared: FeatureSet,
    config: SelectionConfig,
    model: PreferenceModel<S>,
}

impl<S> FeatureSelector<S>
where
    S: PosteriorSampler,
{
    #[must_use]
    pub fn new(declared: FeatureSet, config: SelectionConfig, model: PreferenceModel<S>) -> Self {
        Self {
            declared,
            config,
            model,
        }
    }

    #[must_use]
    pub fn declared(&self) -> &FeatureSet {
        &self.declared
    }

    fn validate(&self, store: &FeatureStore) -> Result<(), SelectionError> {
        self.config.validate()?;
        self.model.config().validate()?;
        store.validate(&self.declared)?;
        Ok(())
    }

    pub fn folds(&self, dataset: &PreferenceDataset) -> Result<ParticipantFolds, SelectionError> {
        ParticipantFolds::new(dataset, &self.config)
    }

    /// Runs one round from `state`.
    ///
    /// Every eligible candidate is scored against `state.accepted`; the highest
    /// importance wins, ties going to the earlier declared candidate. Nothing is
    /// accepted unless the winner's importance exceeds the threshold, which finishes
    /// selection.
    pub fn run_round(
        &self,
        dataset: &PreferenceDataset,
        store: &FeatureStore,
        folds: &ParticipantFolds,
        state: SelectionState,
    ) -> Result<(SelectionState, RoundRecord), SelectionError> {
        let round = state.round + 1;
        let eligible: Vec<Candidate> = state.eligible().into_iter().cloned().collect();
        log::info!(
            "round {round}: scoring {} candidates against [{}]",
            eligible.len(),
            state.accepted.column_names().join(", ")
        );

        let baseline = importance::score_folds(&self.model, dataset, store, folds, &state.accepted)?;
        let mut candidates = Vec::with_capacity(eligible.len());
        for candidate in &eligible {
            let with = state.accepted.with_candidate(candidate)?;
            let scores = importance::score_folds(&self.model, dataset, store, folds, &with)?;
            let scored = CandidateImportance::from_scores(candidate.name(), &baseline, &scores);
            log::debug!(
                "round {round}: '{}' importance {:.4} (accuracy {:+.3})",
                scored.candidate,
                scored.importance,
                scored.accuracy_gain
            );
            candidates.push(scored);
        }

        let winner = best_candidate(&candidates)
            .filter(|&i| candidates[i].importance > self.config.importance_threshold);

        let mut next = state.clone();
        next.round = round;
        let accepted = match winner {
            Some(i) => {
                let candidate = &eligible[i];
                next.accepted = state.accepted.with_candidate(candidate)?;
                next.pending.retain(|c| c != candidate);
                log::info!(
                    "round {round}: accepted '{}' (importance {:.4})",
                    candidates[i].candidate,
                    candidates[i].importance
                );
                Some(candidates[i].candidate.clone())
            }
            None => {
                log::info!("round {round}: no candidate exceeded the threshold");
                None
            }
        };
        next.finished = accepted.is_none() || next.eligible().is_empty();

        let record = RoundRecord {
            round,
            baseline: state.accepted.column_names(),
            candidates,
            accepted,
        };
        Ok((next, record))
    }

    /// Runs rounds until one accepts nothing or no eligible candidate remains.
    pub fn select(
        &self,
        dataset: &PreferenceDataset,
        store: &FeatureStore,
    ) -> Result<SelectionReport, SelectionError> {
        self.validate(store)?;
        let folds = self.folds(dataset)?;
        log::info!(
            "selecting among {} candidates with {} participant folds (sizes {:?})",
            self.declared.candidates().len(),
            folds.len(),
            folds.sizes()
        );

        let mut state = SelectionState::initial(&self.declared)?;
        if !state.finished && state.eligible().is_empty() {
            state.finished = true;
        }
        let mut rounds = Vec::new();
        while !state.finished {
            let (next, record) = self.run_round(dataset, store, &folds, state)?;
            rounds.push(record);
            state = next;
        }

        let features = self
            .declared
            .candidates()
            .iter()
            .map(|candidate| {
                let name = candidate.name();
                FeatureRecord {
                    accepted_round: rounds
                        .iter()
                        .find(|r| r.accepted.as_ref() == Some(&name))
                        .map(|r| r.round),
                    importance_by_round: rounds
                        .iter()
                        .filter_map(|r| {
                            r.candidates
                                .iter()
                                .find(|c| c.candidate == name)
                                .map(|c| (r.round, c.importance))
                        })
                        .collect(),
                    feature: name,
                }
            })
            .collect();

        Ok(SelectionReport {
            selected: state.accepted,
            folds: FoldSummary::from(&folds),
            rounds,
            features,
        })
    }

    /// Scores every declared candidate once, without accepting anything.
    ///
    /// Base features are compared against the controls alone. An interaction is
    /// compared against the controls plus its own components, so it measures what the
    /// product term adds beyond its parts.
    pub fn analyze_importance(
        &self,
        dataset: &PreferenceDataset,
        store: &FeatureStore,
    ) -> Result<ImportanceReport, SelectionError> {
        self.validate(store)?;
        let folds = self.folds(dataset)?;
        let controls = FeatureSet::controls_only(self.declared.controls().to_vec())?;
        let control_scores = importance::score_folds(&self.model, dataset, store, &folds, &controls)?;

        let mut candidates = Vec::new();
        for candidate in self.declared.candidates() {
            let context = candidate
                .requirements()
                .iter()
                .try_fold(controls.clone(), |set, component| {
                    set.with_candidate(&Candidate::Base(component.clone()))
                })?;
            let baseline = if context == controls {
                control_scores.clone()
            } else {
                importance::score_folds(&self.model, dataset, store, &folds, &context)?
            };
            let with = context.with_candidate(&candidate)?;
            let scores = importance::score_folds(&self.model, dataset, store, &folds, &with)?;
            let scored = CandidateImportance::from_scores(candidate.name(), &baseline, &scores);
            log::info!(
                "'{}': importance {:.4}, accuracy gain {:+.3}",
                scored.candidate,
                scored.importance,
                scored.accuracy_gain
            );
            candidates.push(scored);
        }

        Ok(ImportanceReport {
            folds: FoldSummary::from(&folds),
            controls: controls.column_names(),
            candidates,
        })
    }
}

/// Index of the highest finite importance; ties keep the earlier candidate.
fn best_candidate(candidates: &[CandidateImportance]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, c) in candidates.iter().enumerate() {
        if !c.importance.is_finite() {
            log::warn!("'{}' has non-finite importance {}", c.candidate, c.importance);
            continue;
        }
        if best.is_none_or(|b| c.importance > candidates[b].importance) {
            best = Some(i);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use keycomfort_features::Interaction;

    use crate::test_support::{
        MapSampler, fast_model, same_finger_dataset, selection_config, store,
    };

    use super::*;

    fn selector(declared: FeatureSet) -> FeatureSelector<MapSampler> {
        FeatureSelector::new(declared, selection_config(), fast_model())
    }

    fn declared() -> FeatureSet {
        FeatureSet::new(
            vec!["home_row".to_owned(), "same_finger".to_owned()],
            vec![Interaction::new(["home_row", "same_finger"])],
            Vec::new(),
        )
        .unwrap()
    }

    fn scored(candidate: &str, importance: f64) -> CandidateImportance {
        CandidateImportance {
            candidate: candidate.to_owned(),
            importance,
            accuracy_gain: 0.0,
            folds: Vec::new(),
        }
    }

    #[test]
    fn test_best_candidate_skips_non_finite_importance() {
        let candidates = [
            scored("home_row", f64::NAN),
            scored("same_finger", 0.2),
            scored("row_span", 0.5),
            scored("outward_roll", 0.5),
            scored("finger_span", f64::INFINITY),
        ];
        assert_eq!(best_candidate(&candidates), Some(2));
        assert_eq!(best_candidate(&[scored("home_row", f64::NAN)]), None);
        assert_eq!(best_candidate(&[]), None);
    }

    #[test]
    fn test_initial_state_holds_controls_only() {
        let declared = FeatureSet::new(
            vec!["same_finger".to_owned()],
            Vec::new(),
            vec!["row_span".to_owned()],
        )
        .unwrap();
        let state = SelectionState::initial(&declared).unwrap();
        assert_eq!(state.accepted.column_names(), vec!["row_span"]);
        assert_eq!(state.pending.len(), 1);
        assert!(!state.finished);
    }

    #[test]
    fn test_interactions_wait_for_components() {
        let state = SelectionState::initial(&declared()).unwrap();
        let eligible: Vec<String> = state.eligible().iter().map(|c| c.name()).collect();
        assert_eq!(eligible, vec!["home_row", "same_finger"]);

        let accepted = state
            .accepted
            .with_candidate(&Candidate::Base("home_row".to_owned()))
            .unwrap()
            .with_candidate(&Candidate::Base("same_finger".to_owned()))
            .unwrap();
        let state = SelectionState {
            accepted,
            pending: vec![Candidate::Interaction(Interaction::new([
                "home_row",
                "same_finger",
            ]))],
            ..state
        };
        assert_eq!(state.eligible().len(), 1);
    }

    #[test]
    fn test_round_accepts_informative_feature() {
        let dataset = same_finger_dataset(12, 8);
        let store = store();
        let selector = selector(declared());
        let folds = selector.folds(&dataset).unwrap();
        let state = SelectionState::initial(selector.declared()).unwrap();
        let (next, record) = selector.run_round(&dataset, &store, &folds, state).unwrap();

        assert_eq!(record.round, 1);
        assert!(record.baseline.is_empty());
        assert_eq!(record.candidates.len(), 2);
        assert_eq!(record.accepted.as_deref(), Some("same_finger"));
        // home_row never differs within a compared pair, so it cannot help
        assert!(record.candidates[0].importance.abs() < 1e-12);
        assert!(record.candidates[1].importance > 0.1);
        assert_eq!(next.accepted.base(), ["same_finger".to_owned()]);
        assert!(!next.finished);
    }

    #[test]
    fn test_round_is_replayable() {
        let dataset = same_finger_dataset(12, 8);
        let store = store();
        let selector = selector(declared());
        let folds = selector.folds(&dataset).unwrap();
        let state = SelectionState::initial(selector.declared()).unwrap();
        let first = selector
            .run_round(&dataset, &store, &folds, state.clone())
            .unwrap();
        let second = selector.run_round(&dataset, &store, &folds, state).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_scenario_small_folds_are_merged_and_selection_completes() {
        // 12 participants x 8 rows into 5 folds leaves three folds below 20 rows.
        let dataset = same_finger_dataset(12, 8);
        let report = selector(declared()).select(&dataset, &store()).unwrap();

        assert_eq!(report.folds.merged, 2);
        assert_eq!(report.folds.sizes.iter().sum::<usize>(), dataset.len());
        assert_eq!(report.selected.base(), ["same_finger".to_owned()]);
        assert!(report.selected.interactions().is_empty());
        assert_eq!(report.rounds.len(), 2);
        assert_eq!(report.rounds[1].accepted, None);

        let same_finger = &report.features[1];
        assert_eq!(same_finger.feature, "same_finger");
        assert_eq!(same_finger.accepted_round, Some(1));
        let home_row = &report.features[0];
        assert_eq!(home_row.accepted_round, None);
        assert_eq!(home_row.importance_by_round.len(), 2);
        let interaction = &report.features[2];
        assert!(interaction.importance_by_round.is_empty());
    }

    #[test]
    fn test_ties_go_to_declaration_order() {
        // Neither feature differs within any compared pair: both gains are exactly 0.
        let dataset = same_finger_dataset(6, 4);
        let declared = FeatureSet::new(
            vec!["home_row".to_owned(), "row_span".to_owned()],
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let selector = FeatureSelector::new(
            declared,
            SelectionConfig {
                importance_threshold: -1.0,
                min_fold_size: 1,
                ..selection_config()
            },
            fast_model(),
        );
        let store = store();
        let folds = selector.folds(&dataset).unwrap();
        let state = SelectionState::initial(selector.declared()).unwrap();
        let (_, record) = selector.run_round(&dataset, &store, &folds, state).unwrap();
        assert_eq!(record.accepted.as_deref(), Some("home_row"));
    }

    #[test]
    fn test_unknown_feature_fails_before_fitting() {
        let declared =
            FeatureSet::new(vec!["no_such_feature".to_owned()], Vec::new(), Vec::new()).unwrap();
        let err = selector(declared)
            .select(&same_finger_dataset(4, 4), &store())
            .unwrap_err();
        assert!(matches!(
            err,
            SelectionError::Config(ConfigError::UnknownFeature { .. })
        ));
    }

    #[test]
    fn test_analyze_importance_scores_every_candidate() {
        let dataset = same_finger_dataset(12, 8);
        let report = selector(declared())
            .analyze_importance(&dataset, &store())
            .unwrap();
        let names: Vec<&str> = report.candidates.iter().map(|c| c.candidate.as_str()).collect();
        assert_eq!(names, vec!["home_row", "same_finger", "home_row_x_same_finger"]);
        assert!(report.candidates[1].importance > 0.1);
        assert!(report.controls.is_empty());
    }
}
