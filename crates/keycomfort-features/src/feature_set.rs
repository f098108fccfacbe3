//! Declared model columns: base features, interactions, and controls.
//!
//! A [`FeatureSet`] is validated on construction (and on deserialization):
//!
//! - names are unique across base features and controls
//! - every interaction references at least two distinct *base* features
//!   (closure: an interaction whose component is not a declared base feature is
//!   rejected)
//!
//! Column order is `base`, then `interactions`, then `controls`. Base features and
//! interactions are *design* columns and contribute to comfort scores; controls only
//! absorb nuisance variation during fitting.

use std::{collections::BTreeSet, fmt};

use keycomfort_core::ConfigError;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Product of two or more standardized base features.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Interaction {
    components: Vec<String>,
}

impl Interaction {
    pub const SEPARATOR: &'static str = "_x_";

    #[must_use]
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Component names joined with `_x_` in declared order.
    #[must_use]
    pub fn name(&self) -> String {
        self.components.join(Self::SEPARATOR)
    }
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A feature or interaction that selection may add to a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Candidate {
    Base(String),
    Interaction(Interaction),
}

impl Candidate {
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Base(name) => name.clone(),
            Self::Interaction(interaction) => interaction.name(),
        }
    }

    /// Base features that must already be accepted before this candidate is eligible.
    #[must_use]
    pub fn requirements(&self) -> &[String] {
        match self {
            Self::Base(_) => &[],
            Self::Interaction(interaction) => interaction.components(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawFeatureSet {
    base: Vec<String>,
    interactions: Vec<Interaction>,
    controls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFeatureSet", into = "RawFeatureSet")]
pub struct FeatureSet {
    base: Vec<String>,
    interactions: Vec<Interaction>,
    controls: Vec<String>,
}

impl TryFrom<RawFeatureSet> for FeatureSet {
    type Error = ConfigError;

    fn try_from(raw: RawFeatureSet) -> Result<Self, Self::Error> {
        Self::new(raw.base, raw.interactions, raw.controls)
    }
}

impl From<FeatureSet> for RawFeatureSet {
    fn from(set: FeatureSet) -> Self {
        Self {
            base: set.base,
            interactions: set.interactions,
            controls: set.controls,
        }
    }
}

impl FeatureSet {
    /// Validates and builds a feature set. An entirely empty set is allowed; it is the
    /// starting point of selection. Use [`FeatureSet::require_columns`] where a model
    /// must be fit.
    pub fn new(
        base: Vec<String>,
        interactions: Vec<Interaction>,
        controls: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        for name in base.iter().chain(&controls) {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateFeature {
                    feature: name.clone(),
                });
            }
        }
        let base_names: BTreeSet<_> = base.iter().map(String::as_str).collect();
        let mut interaction_names = BTreeSet::new();
        for interaction in &interactions {
            let components: BTreeSet<_> = interaction.components().iter().collect();
            if components.len() < 2 || components.len() != interaction.components().len() {
                return Err(ConfigError::InteractionArity {
                    interaction: interaction.name(),
                });
            }
            if let Some(missing) = interaction
                .components()
                .iter()
                .find(|c| !base_names.contains(c.as_str()))
            {
                return Err(ConfigError::UndeclaredInteractionFeature {
                    interaction: interaction.name(),
                    feature: missing.clone(),
                });
            }
            let name = interaction.name();
            if seen.contains(name.as_str()) || !interaction_names.insert(name.clone()) {
                return Err(ConfigError::DuplicateFeature { feature: name });
            }
        }
        Ok(Self {
            base,
            interactions,
            controls,
        })
    }

    /// Set holding only `controls`.
    pub fn controls_only(controls: Vec<String>) -> Result<Self, ConfigError> {
        Self::new(Vec::new(), Vec::new(), controls)
    }

    #[must_use]
    pub fn base(&self) -> &[String] {
        &self.base
    }

    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    #[must_use]
    pub fn controls(&self) -> &[String] {
        &self.controls
    }

    /// Number of model columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.base.len() + self.interactions.len() + self.controls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of leading design columns (base features and interactions).
    #[must_use]
    pub fn design_len(&self) -> usize {
        self.base.len() + self.interactions.len()
    }

    /// Fails with [`ConfigError::EmptyFeatureSet`] when there is nothing to fit.
    pub fn require_columns(&self) -> Result<(), ConfigError> {
        if self.is_empty() {
            Err(ConfigError::EmptyFeatureSet)
        } else {
            Ok(())
        }
    }

    /// Column names in model order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.base
            .iter()
            .cloned()
            .chain(self.interactions.iter().map(Interaction::name))
            .chain(self.controls.iter().cloned())
            .collect()
    }

    /// Raw source ids this set reads.
    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.base
            .iter()
            .chain(&self.controls)
            .map(String::as_str)
    }

    /// Base features and interactions in declaration order, as selection candidates.
    #[must_use]
    pub fn candidates(&self) -> Vec<Candidate> {
        self.base
            .iter()
            .cloned()
            .map(Candidate::Base)
            .chain(self.interactions.iter().cloned().map(Candidate::Interaction))
            .collect()
    }

    #[must_use]
    pub fn contains(&self, candidate: &Candidate) -> bool {
        match candidate {
            Candidate::Base(name) => self.base.contains(name),
            Candidate::Interaction(interaction) => self.interactions.contains(interaction),
        }
    }

    /// Returns a new set with `candidate` appended, re-checking closure.
    pub fn with_candidate(&self, candidate: &Candidate) -> Result<Self, ConfigError> {
        let mut base = self.base.clone();
        let mut interactions = self.interactions.clone();
        match candidate {
            Candidate::Base(name) => base.push(name.clone()),
            Candidate::Interaction(interaction) => interactions.push(interaction.clone()),
        }
        Self::new(base, interactions, self.controls.clone())
    }

    /// Digest of the column definitions, independent of layout.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (section, names) in [
            ("base", self.base.clone()),
            (
                "interaction",
                self.interactions.iter().map(Interaction::name).collect(),
            ),
            ("control", self.controls.clone()),
        ] {
            for name in names {
                hasher.update(format!("{section}\t{name}\n").as_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn test_rejects_interaction_with_missing_base() {
        let err = FeatureSet::new(
            names(&["same_finger"]),
            vec![Interaction::new(["same_finger", "row_span"])],
            Vec::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UndeclaredInteractionFeature {
                interaction: "same_finger_x_row_span".to_owned(),
                feature: "row_span".to_owned(),
            }
        );
    }

    #[test]
    fn test_rejects_interaction_on_control() {
        let err = FeatureSet::new(
            names(&["same_finger"]),
            vec![Interaction::new(["same_finger", "bigram_frequency"])],
            names(&["bigram_frequency"]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UndeclaredInteractionFeature { .. }));
    }

    #[test]
    fn test_rejects_duplicates_and_arity() {
        assert!(matches!(
            FeatureSet::new(names(&["a", "a"]), Vec::new(), Vec::new()),
            Err(ConfigError::DuplicateFeature { .. })
        ));
        assert!(matches!(
            FeatureSet::new(names(&["a"]), Vec::new(), names(&["a"])),
            Err(ConfigError::DuplicateFeature { .. })
        ));
        assert!(matches!(
            FeatureSet::new(names(&["a"]), vec![Interaction::new(["a", "a"])], Vec::new()),
            Err(ConfigError::InteractionArity { .. })
        ));
    }

    #[test]
    fn test_column_order_and_candidates() {
        let set = FeatureSet::new(
            names(&["row_span", "same_finger"]),
            vec![Interaction::new(["row_span", "same_finger"])],
            names(&["bigram_frequency"]),
        )
        .unwrap();
        assert_eq!(
            set.column_names(),
            names(&["row_span", "same_finger", "row_span_x_same_finger", "bigram_frequency"])
        );
        assert_eq!(set.design_len(), 3);
        let candidates = set.candidates();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[2].requirements(), names(&["row_span", "same_finger"]));
    }

    #[test]
    fn test_deserialization_validates() {
        let json = r#"{"base":["a"],"interactions":[["a","b"]]}"#;
        assert!(serde_json::from_str::<FeatureSet>(json).is_err());
        let json = r#"{"base":["a","b"],"interactions":[["a","b"]]}"#;
        let set: FeatureSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.interactions()[0].name(), "a_x_b");
    }

    #[test]
    fn test_empty_set_needs_columns_to_fit() {
        let set = FeatureSet::default();
        assert_eq!(set.require_columns(), Err(ConfigError::EmptyFeatureSet));
    }
}
