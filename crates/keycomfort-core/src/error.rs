use crate::bigram::BigramError;

/// Malformed or inconsistent preference data.
///
/// Row numbers are zero-based positions in the input table (excluding the header).
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum DataError {
    #[display("row {row}: {source}")]
    InvalidBigram {
        row: usize,
        source: BigramError,
    },
    #[display("row {row}: missing participant identifier")]
    MissingParticipant { row: usize },
    #[display("row {row}: chosen bigram '{chosen}' is neither '{bigram_a}' nor '{bigram_b}'")]
    WinnerNotInPair {
        row: usize,
        chosen: String,
        bigram_a: String,
        bigram_b: String,
    },
    #[display("row {row}: bigram '{bigram}' is compared with itself")]
    SelfPair { row: usize, bigram: String },
    #[display("row {row}: preference strength {value} must be finite and non-negative")]
    InvalidStrength { row: usize, value: f64 },
    #[display("dataset '{source_name}' contains no preferences")]
    EmptyDataset { source_name: String },
    #[display("failed to read preference table: {source}")]
    Csv { source: csv::Error },
    #[display("index {index} is out of range for a dataset of {len} preferences")]
    IndexOutOfRange { index: usize, len: usize },
    #[display("test ratio {ratio} must lie strictly between 0 and 1")]
    InvalidTestRatio { ratio: f64 },
    #[display("at least two participants are required to split, found {found}")]
    InsufficientParticipants { found: usize },
    #[display("split was created for dataset {expected}, but the dataset fingerprint is {found}")]
    SplitFingerprintMismatch { expected: String, found: String },
    #[display("participant '{participant}' appears on both sides of the split")]
    SplitParticipantOverlap { participant: String },
    #[display("split does not cover row {row} exactly once")]
    SplitCoverage { row: usize },
}
