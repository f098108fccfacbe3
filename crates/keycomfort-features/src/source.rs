//! Feature source types for extracting raw values from bigrams.
//!
//! Each source implements [`BigramFeatureSource`] and measures one ergonomic property
//! of typing two keys in sequence on a [`Layout`](crate::Layout). Values are raw; the
//! [`FeatureStore`](crate::FeatureStore) standardizes them over the layout's bigram
//! population before use.

use std::{fmt, sync::Arc};

use keycomfort_core::Bigram;

use crate::{frequency::BigramFrequencies, layout::KeyPosition};

/// Positions of both keys of a bigram, resolved against a layout.
#[derive(Debug, Clone, Copy)]
pub struct BigramKeys<'a> {
    pub bigram: Bigram,
    pub first: &'a KeyPosition,
    pub second: &'a KeyPosition,
}

impl BigramKeys<'_> {
    fn same_hand(&self) -> bool {
        self.first.hand == self.second.hand
    }

    fn finger_distance(&self) -> Option<u8> {
        self.same_hand()
            .then(|| self.first.finger.ordinal().abs_diff(self.second.finger.ordinal()))
    }
}

/// Built-in geometric sources plus the frequency source when a table is available.
#[must_use]
pub fn all_bigram_feature_sources(
    frequencies: Option<Arc<BigramFrequencies>>,
) -> Vec<BoxedBigramFeatureSource> {
    let mut sources: Vec<BoxedBigramFeatureSource> = vec![
        // finger coordination
        Box::new(SameFinger),
        Box::new(AdjacentFinger),
        Box::new(OutwardRoll),
        Box::new(FingerStrength),
        // reach
        Box::new(RowSpan),
        Box::new(ColumnSpan),
        Box::new(HomeRow),
    ];
    if let Some(frequencies) = frequencies {
        sources.push(Box::new(BigramFrequency::new(frequencies)));
    }
    sources
}

pub trait BigramFeatureSource: fmt::Debug + Send + Sync {
    #[must_use]
    fn id(&self) -> &str;
    #[must_use]
    fn name(&self) -> &str;
    #[must_use]
    fn clone_boxed(&self) -> BoxedBigramFeatureSource;
    #[must_use]
    fn extract_raw(&self, keys: &BigramKeys<'_>) -> f64;
}

pub type BoxedBigramFeatureSource = Box<dyn BigramFeatureSource>;

impl Clone for BoxedBigramFeatureSource {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

impl BigramFeatureSource for BoxedBigramFeatureSource {
    fn id(&self) -> &str {
        self.as_ref().id()
    }

    fn name(&self) -> &str {
        self.as_ref().name()
    }

    fn clone_boxed(&self) -> BoxedBigramFeatureSource {
        self.as_ref().clone_boxed()
    }

    fn extract_raw(&self, keys: &BigramKeys<'_>) -> f64 {
        self.as_ref().extract_raw(keys)
    }
}

fn indicator(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Both keys are typed by the same finger of the same hand.
///
/// # Raw measurement
///
/// `raw = 1` if hand and finger match, else `0`.
#[derive(Debug, Clone)]
pub struct SameFinger;

impl BigramFeatureSource for SameFinger {
    fn id(&self) -> &'static str {
        "same_finger"
    }
    fn name(&self) -> &'static str {
        "Same Finger"
    }
    fn clone_boxed(&self) -> BoxedBigramFeatureSource {
        Box::new(self.clone())
    }
    fn extract_raw(&self, keys: &BigramKeys<'_>) -> f64 {
        indicator(keys.finger_distance() == Some(0))
    }
}

/// Keys are typed by neighboring fingers of the same hand.
#[derive(Debug, Clone)]
pub struct AdjacentFinger;

impl BigramFeatureSource for AdjacentFinger {
    fn id(&self) -> &'static str {
        "adjacent_finger"
    }
    fn name(&self) -> &'static str {
        "Adjacent Finger"
    }
    fn clone_boxed(&self) -> BoxedBigramFeatureSource {
        Box::new(self.clone())
    }
    fn extract_raw(&self, keys: &BigramKeys<'_>) -> f64 {
        indicator(keys.finger_distance() == Some(1))
    }
}

/// Same-hand movement from an inner finger toward the pinky.
///
/// # Raw measurement
///
/// `raw = 1` if both keys are on one hand and the second finger is closer to the
/// outer edge than the first, else `0`.
#[derive(Debug, Clone)]
pub struct OutwardRoll;

impl BigramFeatureSource for OutwardRoll {
    fn id(&self) -> &'static str {
        "outward_roll"
    }
    fn name(&self) -> &'static str {
        "Outward Roll"
    }
    fn clone_boxed(&self) -> BoxedBigramFeatureSource {
        Box::new(self.clone())
    }
    fn extract_raw(&self, keys: &BigramKeys<'_>) -> f64 {
        indicator(keys.same_hand() && keys.second.finger < keys.first.finger)
    }
}

/// Mean dexterity of the two fingers involved (see [`Finger::strength`](crate::Finger::strength)).
#[derive(Debug, Clone)]
pub struct FingerStrength;

impl BigramFeatureSource for FingerStrength {
    fn id(&self) -> &'static str {
        "finger_strength"
    }
    fn name(&self) -> &'static str {
        "Finger Strength"
    }
    fn clone_boxed(&self) -> BoxedBigramFeatureSource {
        Box::new(self.clone())
    }
    fn extract_raw(&self, keys: &BigramKeys<'_>) -> f64 {
        f64::midpoint(keys.first.finger.strength(), keys.second.finger.strength())
    }
}

/// Number of rows crossed between the two keys.
#[derive(Debug, Clone)]
pub struct RowSpan;

impl BigramFeatureSource for RowSpan {
    fn id(&self) -> &'static str {
        "row_span"
    }
    fn name(&self) -> &'static str {
        "Row Span"
    }
    fn clone_boxed(&self) -> BoxedBigramFeatureSource {
        Box::new(self.clone())
    }
    fn extract_raw(&self, keys: &BigramKeys<'_>) -> f64 {
        f64::from(keys.first.row.abs_diff(keys.second.row))
    }
}

/// Horizontal distance in columns; zero across hands.
#[derive(Debug, Clone)]
pub struct ColumnSpan;

impl BigramFeatureSource for ColumnSpan {
    fn id(&self) -> &'static str {
        "column_span"
    }
    fn name(&self) -> &'static str {
        "Column Span"
    }
    fn clone_boxed(&self) -> BoxedBigramFeatureSource {
        Box::new(self.clone())
    }
    fn extract_raw(&self, keys: &BigramKeys<'_>) -> f64 {
        if keys.same_hand() {
            f64::from(keys.first.column.abs_diff(keys.second.column))
        } else {
            0.0
        }
    }
}

/// Number of keys (0 to 2) on the home row.
#[derive(Debug, Clone)]
pub struct HomeRow;

impl BigramFeatureSource for HomeRow {
    fn id(&self) -> &'static str {
        "home_row"
    }
    fn name(&self) -> &'static str {
        "Home Row Keys"
    }
    fn clone_boxed(&self) -> BoxedBigramFeatureSource {
        Box::new(self.clone())
    }
    fn extract_raw(&self, keys: &BigramKeys<'_>) -> f64 {
        indicator(keys.first.is_home_row()) + indicator(keys.second.is_home_row())
    }
}

/// Log relative corpus frequency of the bigram.
///
/// Frequent bigrams are practiced more, which biases comfort judgments; this source is
/// usually declared as a control rather than a design feature.
#[derive(Debug, Clone)]
pub struct BigramFrequency {
    frequencies: Arc<BigramFrequencies>,
}

impl BigramFrequency {
    #[must_use]
    pub fn new(frequencies: Arc<BigramFrequencies>) -> Self {
        Self { frequencies }
    }
}

impl BigramFeatureSource for BigramFrequency {
    fn id(&self) -> &'static str {
        "bigram_frequency"
    }
    fn name(&self) -> &'static str {
        "Bigram Frequency (log)"
    }
    fn clone_boxed(&self) -> BoxedBigramFeatureSource {
        Box::new(self.clone())
    }
    fn extract_raw(&self, keys: &BigramKeys<'_>) -> f64 {
        self.frequencies.log_relative(keys.bigram)
    }
}

#[cfg(test)]
mod tests {
    use crate::layout::Layout;

    use super::*;

    fn raw(source: &dyn BigramFeatureSource, bigram: &str) -> f64 {
        let layout = Layout::qwerty_left();
        let bigram: Bigram = bigram.parse().unwrap();
        let keys = BigramKeys {
            bigram,
            first: layout.position(bigram.first()).unwrap(),
            second: layout.position(bigram.second()).unwrap(),
        };
        source.extract_raw(&keys)
    }

    #[test]
    fn test_same_and_adjacent_finger() {
        assert_eq!(raw(&SameFinger, "qa"), 1.0);
        assert_eq!(raw(&SameFinger, "sd"), 0.0);
        assert_eq!(raw(&AdjacentFinger, "sd"), 1.0);
        assert_eq!(raw(&AdjacentFinger, "fg"), 0.0);
    }

    #[test]
    fn test_spans() {
        assert_eq!(raw(&RowSpan, "qz"), 2.0);
        assert_eq!(raw(&ColumnSpan, "ag"), 4.0);
        assert_eq!(raw(&HomeRow, "sd"), 2.0);
        assert_eq!(raw(&HomeRow, "qa"), 1.0);
    }

    #[test]
    fn test_outward_roll_direction() {
        assert_eq!(raw(&OutwardRoll, "fa"), 1.0);
        assert_eq!(raw(&OutwardRoll, "af"), 0.0);
    }

    #[test]
    fn test_source_ids_are_unique() {
        let table = BigramFrequencies::new([("th".parse().unwrap(), 1.0)]).unwrap();
        let sources = all_bigram_feature_sources(Some(Arc::new(table)));
        let mut ids: Vec<_> = sources.iter().map(|s| s.id().to_owned()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), sources.len());
    }
}
