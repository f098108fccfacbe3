//! Validated preference observation table.

use std::{
    collections::{BTreeMap, BTreeSet},
    io,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::{
    bigram::{Bigram, BigramPair},
    error::DataError,
    observation::{ObservationMetadata, ParticipantId, PreferenceObservation, Winner},
    transitivity::{self, TransitivityReport},
};

/// One row of the preference table, as read from CSV.
///
/// Column names follow the collection tool's export format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPreferenceRow {
    #[serde(rename = "user_id", alias = "participant", default)]
    pub participant: Option<String>,
    pub bigram1: String,
    pub bigram2: String,
    pub chosen_bigram: String,
    #[serde(default)]
    pub bigram1_time: Option<f64>,
    #[serde(default)]
    pub bigram2_time: Option<f64>,
    #[serde(rename = "abs_sliderValue", alias = "strength", default)]
    pub strength: Option<f64>,
}

/// How participant identifiers of two sources are reconciled by
/// [`PreferenceDataset::merge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Equal identifiers in both sources denote the same participant.
    SharedParticipants,
    /// Sources were collected independently; identifiers are prefixed with the source
    /// tag so equal raw identifiers stay distinct participants.
    DistinctSources { left_tag: String, right_tag: String },
}

/// Preference observations loaded from one or more sources.
///
/// Read-only after construction: every view (subsets, splits, merges) produces a new
/// dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceDataset {
    source: String,
    observations: Vec<PreferenceObservation>,
}

impl PreferenceDataset {
    /// Validates raw rows and builds a dataset.
    ///
    /// Fails on the first invalid row: unparsable or same-key bigrams, a missing
    /// participant, a self-pair, a winner that is neither bigram, or a negative or
    /// non-finite strength. Non-finite typing times are treated as absent.
    pub fn load<I>(source: impl Into<String>, rows: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = RawPreferenceRow>,
    {
        let source = source.into();
        let observations = rows
            .into_iter()
            .enumerate()
            .map(|(row, raw)| parse_row(row, &raw))
            .collect::<Result<Vec<_>, _>>()?;
        if observations.is_empty() {
            return Err(DataError::EmptyDataset {
                source_name: source,
            });
        }
        log::info!(
            "loaded {} preferences from {} participants ({source})",
            observations.len(),
            observations
                .iter()
                .map(|o| &o.participant)
                .collect::<BTreeSet<_>>()
                .len()
        );
        Ok(Self {
            source,
            observations,
        })
    }

    /// Reads and validates a CSV preference table with a header row.
    pub fn from_csv_reader<R>(source: impl Into<String>, reader: R) -> Result<Self, DataError>
    where
        R: io::Read,
    {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let rows = reader
            .deserialize::<RawPreferenceRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| DataError::Csv { source })?;
        Self::load(source, rows)
    }

    /// Builds a dataset from already-typed observations, re-checking row invariants.
    pub fn from_observations(
        source: impl Into<String>,
        observations: Vec<PreferenceObservation>,
    ) -> Result<Self, DataError> {
        for (row, obs) in observations.iter().enumerate() {
            validate_observation(row, obs)?;
        }
        Ok(Self {
            source: source.into(),
            observations,
        })
    }

    /// Name of the source(s) this dataset was loaded from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    #[must_use]
    pub fn observations(&self) -> &[PreferenceObservation] {
        &self.observations
    }

    /// Distinct participants, sorted.
    #[must_use]
    pub fn participants(&self) -> Vec<ParticipantId> {
        self.participant_row_counts().into_keys().collect()
    }

    /// Number of observations contributed by each participant.
    #[must_use]
    pub fn participant_row_counts(&self) -> BTreeMap<ParticipantId, usize> {
        let mut counts = BTreeMap::new();
        for obs in &self.observations {
            *counts.entry(obs.participant.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Observations contributed by `participant`, in table order.
    pub fn observations_of<'a>(
        &'a self,
        participant: &'a ParticipantId,
    ) -> impl Iterator<Item = &'a PreferenceObservation> + 'a {
        self.observations
            .iter()
            .filter(move |o| &o.participant == participant)
    }

    /// Row indices grouped by participant.
    #[must_use]
    pub fn rows_by_participant(&self) -> BTreeMap<ParticipantId, Vec<usize>> {
        let mut rows: BTreeMap<ParticipantId, Vec<usize>> = BTreeMap::new();
        for (i, obs) in self.observations.iter().enumerate() {
            rows.entry(obs.participant.clone()).or_default().push(i);
        }
        rows
    }

    /// Dataset containing the rows at `indices`, in the given order.
    pub fn subset(&self, indices: &[usize]) -> Result<Self, DataError> {
        let observations = indices
            .iter()
            .map(|&index| {
                self.observations
                    .get(index)
                    .cloned()
                    .ok_or(DataError::IndexOutOfRange {
                        index,
                        len: self.observations.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: self.source.clone(),
            observations,
        })
    }

    /// Every bigram appearing in at least one comparison.
    #[must_use]
    pub fn bigrams(&self) -> BTreeSet<Bigram> {
        self.observations
            .iter()
            .flat_map(|o| [o.bigram_a, o.bigram_b])
            .collect()
    }

    /// Every unordered pair that has been compared at least once.
    #[must_use]
    pub fn observed_pairs(&self) -> BTreeSet<BigramPair> {
        self.observations.iter().filter_map(|o| o.pair()).collect()
    }

    /// Combines this dataset with a supplementary source of the same schema.
    ///
    /// Rows of `self` come first. With [`MergePolicy::DistinctSources`] both sides'
    /// identifiers are namespaced as `tag:id`.
    pub fn merge(&self, other: &Self, policy: &MergePolicy) -> Result<Self, DataError> {
        let relabel = |obs: &PreferenceObservation, tag: Option<&str>| {
            let mut obs = obs.clone();
            if let Some(tag) = tag {
                obs.participant = ParticipantId::new(format!("{tag}:{}", obs.participant));
            }
            obs
        };
        let (left_tag, right_tag) = match policy {
            MergePolicy::SharedParticipants => (None, None),
            MergePolicy::DistinctSources {
                left_tag,
                right_tag,
            } => (Some(left_tag.as_str()), Some(right_tag.as_str())),
        };
        let observations = self
            .observations
            .iter()
            .map(|o| relabel(o, left_tag))
            .chain(other.observations.iter().map(|o| relabel(o, right_tag)))
            .collect();
        let merged = Self::from_observations(format!("{}+{}", self.source, other.source), observations)?;
        log::info!(
            "merged {} + {} preferences into {} participants",
            self.len(),
            other.len(),
            merged.participant_row_counts().len()
        );
        Ok(merged)
    }

    /// SHA-256 fingerprint of the ordered observation table.
    ///
    /// Used to key persisted [`Split`](crate::Split)s; any change to rows, their order,
    /// or participant labels changes the fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for obs in &self.observations {
            let winner = match obs.winner {
                Winner::First => 'a',
                Winner::Second => 'b',
            };
            hasher.update(
                format!(
                    "{}\t{}\t{}\t{winner}\n",
                    obs.participant, obs.bigram_a, obs.bigram_b
                )
                .as_bytes(),
            );
        }
        hex::encode(hasher.finalize())
    }

    /// Counts transitivity violations among the stated preferences.
    #[must_use]
    pub fn check_transitivity(&self) -> TransitivityReport {
        transitivity::check(&self.observations)
    }
}

fn parse_row(row: usize, raw: &RawPreferenceRow) -> Result<PreferenceObservation, DataError> {
    let participant = raw
        .participant
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or(DataError::MissingParticipant { row })?;
    let parse = |value: &str| {
        value
            .parse::<Bigram>()
            .map_err(|source| DataError::InvalidBigram { row, source })
    };
    let bigram_a = parse(&raw.bigram1)?;
    let bigram_b = parse(&raw.bigram2)?;
    let chosen = parse(&raw.chosen_bigram).map_err(|_| DataError::WinnerNotInPair {
        row,
        chosen: raw.chosen_bigram.trim().to_owned(),
        bigram_a: bigram_a.to_string(),
        bigram_b: bigram_b.to_string(),
    })?;
    if bigram_a == bigram_b {
        return Err(DataError::SelfPair {
            row,
            bigram: bigram_a.to_string(),
        });
    }
    let winner = if chosen == bigram_a {
        Winner::First
    } else if chosen == bigram_b {
        Winner::Second
    } else {
        return Err(DataError::WinnerNotInPair {
            row,
            chosen: chosen.to_string(),
            bigram_a: bigram_a.to_string(),
            bigram_b: bigram_b.to_string(),
        });
    };
    if let Some(value) = raw.strength {
        if !value.is_finite() || value < 0.0 {
            return Err(DataError::InvalidStrength { row, value });
        }
    }
    let finite = |t: Option<f64>| t.filter(|t| t.is_finite());
    Ok(PreferenceObservation {
        participant: ParticipantId::new(participant),
        bigram_a,
        bigram_b,
        winner,
        metadata: ObservationMetadata {
            time_a: finite(raw.bigram1_time),
            time_b: finite(raw.bigram2_time),
            strength: raw.strength,
        },
    })
}

fn validate_observation(row: usize, obs: &PreferenceObservation) -> Result<(), DataError> {
    if obs.participant.as_str().trim().is_empty() {
        return Err(DataError::MissingParticipant { row });
    }
    if obs.bigram_a == obs.bigram_b {
        return Err(DataError::SelfPair {
            row,
            bigram: obs.bigram_a.to_string(),
        });
    }
    if let Some(value) = obs.metadata.strength {
        if !value.is_finite() || value < 0.0 {
            return Err(DataError::InvalidStrength { row, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_load_valid_rows() {
        let dataset = PreferenceDataset::load(
            "test",
            vec![row("p1", "qa", "sd", "qa"), row("p2", "sd", "qa", "qa")],
        )
        .unwrap();
        assert_eq!(dataset.len(), 2);
        assert!(dataset.observations()[0].first_preferred());
        assert!(!dataset.observations()[1].first_preferred());
        assert_eq!(dataset.participants().len(), 2);
        assert_eq!(dataset.observed_pairs().len(), 1);
    }

    #[test]
    fn test_rejects_winner_outside_pair() {
        let err = PreferenceDataset::load("test", vec![row("p1", "qa", "sd", "fg")]).unwrap_err();
        assert!(matches!(err, DataError::WinnerNotInPair { row: 0, .. }));
    }

    #[test]
    fn test_rejects_missing_participant() {
        let mut r = row("p1", "qa", "sd", "qa");
        r.participant = Some("  ".to_owned());
        let err = PreferenceDataset::load("test", vec![row("p0", "qa", "sd", "qa"), r]).unwrap_err();
        assert!(matches!(err, DataError::MissingParticipant { row: 1 }));
    }

    #[test]
    fn test_rejects_same_key_bigram() {
        let err = PreferenceDataset::load("test", vec![row("p1", "aa", "sd", "sd")]).unwrap_err();
        assert!(matches!(err, DataError::InvalidBigram { row: 0, .. }));
    }

    #[test]
    fn test_rejects_self_pair() {
        let err = PreferenceDataset::load("test", vec![row("p1", "qa", "QA", "qa")]).unwrap_err();
        assert!(matches!(err, DataError::SelfPair { .. }));
    }

    #[test]
    fn test_rejects_empty() {
        let err = PreferenceDataset::load("test", Vec::new()).unwrap_err();
        assert!(matches!(err, DataError::EmptyDataset { .. }));
    }

    #[test]
    fn test_csv_with_optional_columns() {
        let csv = "user_id,bigram1,bigram2,chosen_bigram,bigram1_time,bigram2_time,abs_sliderValue\n\
                   p1,qa,sd,sd,120.5,,40\n\
                   p2,we,df,we,NaN,98,0\n";
        let dataset = PreferenceDataset::from_csv_reader("csv", csv.as_bytes()).unwrap();
        let first = &dataset.observations()[0];
        assert_eq!(first.metadata.time_a, Some(120.5));
        assert_eq!(first.metadata.time_b, None);
        assert_eq!(first.metadata.strength, Some(40.0));
        assert_eq!(dataset.observations()[1].metadata.time_a, None);
    }

    #[test]
    fn test_csv_without_metadata_columns() {
        let csv = "user_id,bigram1,bigram2,chosen_bigram\np1,qa,sd,qa\n";
        let dataset = PreferenceDataset::from_csv_reader("csv", csv.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_merge_shared_participants() {
        let a = PreferenceDataset::load("a", vec![row("p1", "qa", "sd", "qa")]).unwrap();
        let b = PreferenceDataset::load("b", vec![row("p1", "we", "df", "df")]).unwrap();
        let merged = a.merge(&b, &MergePolicy::SharedParticipants).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.participants(), vec![ParticipantId::from("p1")]);
        assert_eq!(merged.observations_of(&ParticipantId::from("p1")).count(), 2);
        assert_eq!(merged.source(), "a+b");
    }

    #[test]
    fn test_merge_distinct_sources() {
        let a = PreferenceDataset::load("a", vec![row("p1", "qa", "sd", "qa")]).unwrap();
        let b = PreferenceDataset::load("b", vec![row("p1", "we", "df", "df")]).unwrap();
        let policy = MergePolicy::DistinctSources {
            left_tag: "orig".to_owned(),
            right_tag: "extra".to_owned(),
        };
        let merged = a.merge(&b, &policy).unwrap();
        assert_eq!(
            merged.participants(),
            vec![ParticipantId::from("extra:p1"), ParticipantId::from("orig:p1")]
        );
    }

    #[test]
    fn test_fingerprint_depends_on_content() {
        let a = PreferenceDataset::load("a", vec![row("p1", "qa", "sd", "qa")]).unwrap();
        let b = PreferenceDataset::load("b", vec![row("p1", "qa", "sd", "sd")]).unwrap();
        let a2 = PreferenceDataset::load("other name", vec![row("p1", "qa", "sd", "qa")]).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a2.fingerprint());
    }

    #[test]
    fn test_subset_out_of_range() {
        let a = PreferenceDataset::load("a", vec![row("p1", "qa", "sd", "qa")]).unwrap();
        assert!(matches!(
            a.subset(&[3]),
            Err(DataError::IndexOutOfRange { index: 3, len: 1 })
        ));
    }
}
