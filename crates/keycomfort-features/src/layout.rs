//! Physical key positions.

use std::collections::BTreeSet;

use keycomfort_core::{Bigram, ConfigError};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    Left,
    Right,
}

/// Finger assignment, ordered from the outer edge of the hand inward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finger {
    Pinky,
    Ring,
    Middle,
    Index,
}

impl Finger {
    /// 0 for the pinky up to 3 for the index finger.
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Pinky => 0,
            Self::Ring => 1,
            Self::Middle => 2,
            Self::Index => 3,
        }
    }

    /// Relative dexterity, 1 (weakest) to 4.
    #[must_use]
    pub fn strength(self) -> f64 {
        match self {
            Self::Pinky => 1.0,
            Self::Ring => 2.0,
            Self::Middle => 3.5,
            Self::Index => 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPosition {
    pub key: char,
    pub hand: Hand,
    pub finger: Finger,
    /// 0 = top letter row, 1 = home row, 2 = bottom row
    pub row: u8,
    /// Column counted from the outer edge of the hand
    pub column: u8,
}

impl KeyPosition {
    #[must_use]
    pub fn is_home_row(&self) -> bool {
        self.row == Layout::HOME_ROW
    }
}

/// Set of keys a feature source can measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub name: String,
    keys: Vec<KeyPosition>,
}

impl Layout {
    pub const HOME_ROW: u8 = 1;

    /// Builds a layout with lowercased keys, rejecting duplicates.
    pub fn new(name: impl Into<String>, keys: Vec<KeyPosition>) -> Result<Self, ConfigError> {
        let layout = Self {
            name: name.into(),
            keys: keys
                .into_iter()
                .map(|k| KeyPosition {
                    key: k.key.to_ascii_lowercase(),
                    ..k
                })
                .collect(),
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Left-hand block of a QWERTY keyboard: `qwert`, `asdfg`, `zxcvb`.
    ///
    /// Columns 0 to 2 are typed by pinky, ring and middle finger, columns 3 and 4 by
    /// the index finger.
    #[must_use]
    pub fn qwerty_left() -> Self {
        const ROWS: [&str; 3] = ["qwert", "asdfg", "zxcvb"];
        let keys = ROWS
            .iter()
            .zip(0u8..)
            .flat_map(|(row_keys, row)| {
                row_keys.chars().zip(0u8..).map(move |(key, column)| {
                    let finger = match column {
                        0 => Finger::Pinky,
                        1 => Finger::Ring,
                        2 => Finger::Middle,
                        _ => Finger::Index,
                    };
                    KeyPosition {
                        key,
                        hand: Hand::Left,
                        finger,
                        row,
                        column,
                    }
                })
            })
            .collect();
        Self {
            name: "qwerty-left".to_owned(),
            keys,
        }
    }

    /// Checks that every key appears once.
    ///
    /// Needed after deserialization, which bypasses [`Layout::new`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keys.is_empty() {
            return Err(ConfigError::invalid("layout.keys", "layout has no keys"));
        }
        let mut seen = BTreeSet::new();
        for k in &self.keys {
            if !seen.insert(k.key.to_ascii_lowercase()) {
                return Err(ConfigError::invalid(
                    "layout.keys",
                    format!("key '{}' is listed twice", k.key),
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn keys(&self) -> &[KeyPosition] {
        &self.keys
    }

    #[must_use]
    pub fn position(&self, key: char) -> Option<&KeyPosition> {
        let key = key.to_ascii_lowercase();
        self.keys.iter().find(|k| k.key == key)
    }

    /// Every ordered bigram of two distinct layout keys, in layout order.
    #[must_use]
    pub fn bigrams(&self) -> Vec<Bigram> {
        self.keys
            .iter()
            .flat_map(|a| self.keys.iter().map(move |b| (a.key, b.key)))
            .filter_map(|(a, b)| Bigram::new(a, b).ok())
            .collect()
    }

    /// SHA-256 over the key table; part of every feature signature.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for k in &self.keys {
            hasher.update(
                format!(
                    "{}\t{:?}\t{:?}\t{}\t{}\n",
                    k.key, k.hand, k.finger, k.row, k.column
                )
                .as_bytes(),
            );
        }
        hex::encode(hasher.finalize())
    }
}
