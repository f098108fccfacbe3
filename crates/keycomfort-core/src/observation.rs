use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bigram::{Bigram, BigramPair};

/// Opaque participant identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of a comparison the participant chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    First,
    Second,
}

/// Optional measurements recorded with a judgment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationMetadata {
    /// Typing time of the first bigram in milliseconds
    pub time_a: Option<f64>,
    /// Typing time of the second bigram in milliseconds
    pub time_b: Option<f64>,
    /// Absolute slider value expressing how strongly the winner was preferred
    pub strength: Option<f64>,
}

/// One pairwise judgment: `participant` found `winner` more comfortable to type.
///
/// Invariants (enforced by [`PreferenceDataset`](crate::PreferenceDataset)):
/// `bigram_a != bigram_b`, and the winner is one of the two bigrams by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceObservation {
    pub participant: ParticipantId,
    pub bigram_a: Bigram,
    pub bigram_b: Bigram,
    pub winner: Winner,
    #[serde(default)]
    pub metadata: ObservationMetadata,
}

impl PreferenceObservation {
    /// Returns `true` if the first bigram was preferred.
    #[must_use]
    pub fn first_preferred(&self) -> bool {
        self.winner == Winner::First
    }

    #[must_use]
    pub fn chosen(&self) -> Bigram {
        match self.winner {
            Winner::First => self.bigram_a,
            Winner::Second => self.bigram_b,
        }
    }

    #[must_use]
    pub fn rejected(&self) -> Bigram {
        match self.winner {
            Winner::First => self.bigram_b,
            Winner::Second => self.bigram_a,
        }
    }

    /// Unordered pair of compared bigrams.
    ///
    /// Returns `None` only for self-pairs, which a validated dataset never holds.
    #[must_use]
    pub fn pair(&self) -> Option<BigramPair> {
        BigramPair::new(self.bigram_a, self.bigram_b)
    }
}
