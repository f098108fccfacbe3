//! Consistency check over stated preferences.
//!
//! Every observation contributes a directed edge `chosen -> rejected`. Every path
//! `a -> b -> c` counts as one triple, including `c == a`. A triple is transitive when
//! `a -> c` was stated; otherwise it is a violation when `c -> a` was stated.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{bigram::Bigram, observation::PreferenceObservation};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitivityReport {
    pub violations: usize,
    /// Paths `a -> b -> c` in the preference graph
    pub total_triples: usize,
    /// `violations / total_triples`, or 0 when no triple is checkable
    pub violation_rate: f64,
}

pub(crate) fn check(observations: &[PreferenceObservation]) -> TransitivityReport {
    let mut edges: BTreeMap<Bigram, BTreeSet<Bigram>> = BTreeMap::new();
    for obs in observations {
        edges.entry(obs.chosen()).or_default().insert(obs.rejected());
    }
    let prefers = |x: Bigram, y: Bigram| edges.get(&x).is_some_and(|s| s.contains(&y));

    let mut violations = 0;
    let mut total_triples = 0;
    for (&a, worse) in &edges {
        for &b in worse {
            let Some(worse_than_b) = edges.get(&b) else {
                continue;
            };
            for &c in worse_than_b {
                total_triples += 1;
                if prefers(a, c) {
                    continue;
                }
                if prefers(c, a) {
                    violations += 1;
                }
            }
        }
    }

    #[expect(clippy::cast_precision_loss)]
    let violation_rate = if total_triples == 0 {
        0.0
    } else {
        violations as f64 / total_triples as f64
    };
    TransitivityReport {
        violations,
        total_triples,
        violation_rate,
    }
}

#[cfg(test)]
mod tests {
    use crate::{dataset::RawPreferenceRow, PreferenceDataset};

    fn dataset(prefs: &[(&str, &str)]) -> PreferenceDataset {
        let rows = prefs.iter().map(|&(winner, loser)| RawPreferenceRow {
            participant: Some("p".to_owned()),
            bigram1: winner.to_owned(),
            bigram2: loser.to_owned(),
            chosen_bigram: winner.to_owned(),
            bigram1_time: None,
            bigram2_time: None,
            strength: None,
        });
        PreferenceDataset::load("t", rows).unwrap()
    }

    #[test]
    fn test_consistent_chain() {
        let report = dataset(&[("as", "df"), ("df", "gh"), ("as", "gh")]).check_transitivity();
        assert_eq!(report.violations, 0);
        assert_eq!(report.total_triples, 1);
    }

    #[test]
    fn test_cycle_is_violation() {
        let report = dataset(&[("as", "df"), ("df", "gh"), ("gh", "as")]).check_transitivity();
        assert_eq!(report.violations, 3);
        assert_eq!(report.total_triples, 3);
        assert!((report.violation_rate - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unclosed_chain_counts_as_triple() {
        let report = dataset(&[("as", "df"), ("df", "gh")]).check_transitivity();
        assert_eq!(report.violations, 0);
        assert_eq!(report.total_triples, 1);
    }

    #[test]
    fn test_contradictory_pair_counts_each_path_once() {
        let report = dataset(&[("as", "df"), ("df", "gh"), ("as", "gh"), ("gh", "as")])
            .check_transitivity();
        // as>df>gh, as>gh>as, df>gh>as, gh>as>df, gh>as>gh
        assert_eq!(report.total_triples, 5);
        assert_eq!(report.violations, 2);
        assert!((report.violation_rate - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_no_checkable_triples() {
        let report = dataset(&[("as", "df")]).check_transitivity();
        assert_eq!(report.total_triples, 0);
        assert_eq!(report.violation_rate, 0.0);
    }
}
