use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Reasons a string is not a valid bigram.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum BigramError {
    #[display("bigram '{value}' must consist of exactly two key symbols")]
    Malformed { value: String },
    #[display("bigram '{value}' repeats the same key")]
    DuplicateKey { value: String },
}

/// An ordered two-key sequence typed consecutively.
///
/// Symbols are stored lowercase. Same-key bigrams (`"aa"`) are rejected: they carry no
/// information about movement between keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bigram {
    first: char,
    second: char,
}

impl Bigram {
    pub fn new(first: char, second: char) -> Result<Self, BigramError> {
        let first = first.to_ascii_lowercase();
        let second = second.to_ascii_lowercase();
        if first == second {
            return Err(BigramError::DuplicateKey {
                value: format!("{first}{second}"),
            });
        }
        Ok(Self { first, second })
    }

    #[must_use]
    pub fn first(self) -> char {
        self.first
    }

    #[must_use]
    pub fn second(self) -> char {
        self.second
    }

    /// Returns `true` if either position is `key`.
    #[must_use]
    pub fn contains(self, key: char) -> bool {
        self.first == key || self.second == key
    }
}

impl FromStr for Bigram {
    type Err = BigramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(first), Some(second), None) => Self::new(first, second),
            _ => Err(BigramError::Malformed {
                value: trimmed.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for Bigram {
    type Error = BigramError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Bigram> for String {
    fn from(value: Bigram) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Bigram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.first, self.second)
    }
}

/// Unordered pair of distinct bigrams, stored with the smaller bigram first.
///
/// Two observations comparing the same bigrams in either presentation order share one
/// `BigramPair`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BigramPair {
    low: Bigram,
    high: Bigram,
}

impl BigramPair {
    /// Builds the canonical pair, or `None` for a self-pair.
    #[must_use]
    pub fn new(a: Bigram, b: Bigram) -> Option<Self> {
        match a.cmp(&b) {
            Ordering::Less => Some(Self { low: a, high: b }),
            Ordering::Greater => Some(Self { low: b, high: a }),
            Ordering::Equal => None,
        }
    }

    #[must_use]
    pub fn low(self) -> Bigram {
        self.low
    }

    #[must_use]
    pub fn high(self) -> Bigram {
        self.high
    }
}

impl PartialOrd for BigramPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigramPair {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.low, self.high).cmp(&(other.low, other.high))
    }
}

impl fmt::Display for BigramPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let bigram: Bigram = " QA ".parse().unwrap();
        assert_eq!(bigram.to_string(), "qa");
        assert_eq!(bigram.first(), 'q');
        assert_eq!(bigram.second(), 'a');
    }

    #[test]
    fn test_rejects_same_key() {
        assert!(matches!(
            "ee".parse::<Bigram>(),
            Err(BigramError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(matches!(
            "abc".parse::<Bigram>(),
            Err(BigramError::Malformed { .. })
        ));
        assert!(matches!("a".parse::<Bigram>(), Err(BigramError::Malformed { .. })));
    }

    #[test]
    fn test_pair_is_unordered() {
        let a: Bigram = "qa".parse().unwrap();
        let b: Bigram = "sd".parse().unwrap();
        assert_eq!(BigramPair::new(a, b), BigramPair::new(b, a));
        assert!(BigramPair::new(a, a).is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let bigram: Bigram = "df".parse().unwrap();
        let json = serde_json::to_string(&bigram).unwrap();
        assert_eq!(json, "\"df\"");
        let back: Bigram = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bigram);
        assert!(serde_json::from_str::<Bigram>("\"dd\"").is_err());
    }
}
