//! Bigram occurrence frequencies from a reference corpus.

use std::{collections::BTreeMap, io};

use keycomfort_core::Bigram;
use serde::Deserialize;

use crate::error::FeatureError;

/// Relative frequency assigned to bigrams missing from the table before taking logs.
const FREQUENCY_FLOOR: f64 = 1e-9;

/// Occurrence counts (or any non-negative weights) per bigram.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BigramFrequencies {
    counts: BTreeMap<Bigram, f64>,
    total: f64,
}

#[derive(Debug, Deserialize)]
struct FrequencyRow {
    bigram: String,
    frequency: f64,
}

impl BigramFrequencies {
    /// Builds a table, summing repeated bigrams.
    pub fn new<I>(entries: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = (Bigram, f64)>,
    {
        let mut counts = BTreeMap::new();
        for (bigram, frequency) in entries {
            if !frequency.is_finite() || frequency < 0.0 {
                return Err(FeatureError::InvalidFrequency {
                    bigram: bigram.to_string(),
                    value: frequency,
                });
            }
            *counts.entry(bigram).or_insert(0.0) += frequency;
        }
        let total = counts.values().sum();
        Ok(Self { counts, total })
    }

    /// Reads a `bigram,frequency` CSV with a header row.
    pub fn from_csv_reader<R>(reader: R) -> Result<Self, FeatureError>
    where
        R: io::Read,
    {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut entries = Vec::new();
        for row in reader.deserialize::<FrequencyRow>() {
            let row = row?;
            let bigram = row
                .bigram
                .parse::<Bigram>()
                .map_err(|source| FeatureError::InvalidBigram { source })?;
            entries.push((bigram, row.frequency));
        }
        Self::new(entries)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Raw weight of `bigram`, 0 when absent.
    #[must_use]
    pub fn frequency(&self, bigram: Bigram) -> f64 {
        self.counts.get(&bigram).copied().unwrap_or(0.0)
    }

    /// Share of the total weight held by `bigram`, 0 when the table is empty.
    #[must_use]
    pub fn relative(&self, bigram: Bigram) -> f64 {
        if self.total > 0.0 {
            self.frequency(bigram) / self.total
        } else {
            0.0
        }
    }

    /// Natural log of the relative frequency, floored for unseen bigrams.
    #[must_use]
    pub fn log_relative(&self, bigram: Bigram) -> f64 {
        self.relative(bigram).max(FREQUENCY_FLOOR).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bigram(s: &str) -> Bigram {
        s.parse().unwrap()
    }

    #[test]
    fn test_csv_and_relative() {
        let csv = "bigram,frequency\nth,30\nhe,10\nth,20\n";
        let table = BigramFrequencies::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.frequency(bigram("th")), 50.0);
        assert!((table.relative(bigram("he")) - 10.0 / 60.0).abs() < 1e-12);
        assert_eq!(table.relative(bigram("qz")), 0.0);
        assert!(table.log_relative(bigram("qz")) < table.log_relative(bigram("he")));
    }

    #[test]
    fn test_rejects_negative() {
        let err = BigramFrequencies::new([(bigram("ab"), -1.0)]).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidFrequency { .. }));
    }
}
