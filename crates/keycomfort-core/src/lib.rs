//! Core data model for typing-preference analysis.
//!
//! This crate defines the values every other keycomfort crate passes around:
//!
//! - [`Bigram`] - an ordered pair of distinct key symbols, and [`BigramPair`], the
//!   unordered pair of bigrams a participant compared
//! - [`ParticipantId`] - opaque participant identifier
//! - [`PreferenceObservation`] - one pairwise judgment with optional timing and strength
//! - [`PreferenceDataset`] - validated observation table with participant-level views
//! - [`Split`] - persisted, participant-disjoint train/test partition
//!
//! and the two error types raised before any expensive computation starts:
//! [`DataError`] for malformed or inconsistent rows and [`ConfigError`] for invalid
//! configuration.
//!
//! # Data Flow
//!
//! ```text
//! CSV rows (RawPreferenceRow)
//!     ↓ PreferenceDataset::load (validation)
//! PreferenceDataset ──merge──▶ PreferenceDataset
//!     ↓ split(test_ratio, seed)
//! Split (persisted as JSON, verified on reload)
//!     ↓ apply
//! (train, test)
//! ```
//!
//! # Example
//!
//! ```
//! use keycomfort_core::{PreferenceDataset, RawPreferenceRow};
//!
//! let rows = (0..4).map(|i| RawPreferenceRow {
//!     participant: Some(format!("p{i}")),
//!     bigram1: "qa".into(),
//!     bigram2: "sd".into(),
//!     chosen_bigram: "qa".into(),
//!     bigram1_time: None,
//!     bigram2_time: None,
//!     strength: None,
//! });
//! let dataset = PreferenceDataset::load("example", rows).unwrap();
//! let split = dataset.split(0.25, 7).unwrap();
//! assert_eq!(split.test_participants.len(), 1);
//! ```

pub use self::{
    bigram::{Bigram, BigramError, BigramPair},
    config::ConfigError,
    dataset::{MergePolicy, PreferenceDataset, RawPreferenceRow},
    error::DataError,
    observation::{ObservationMetadata, ParticipantId, PreferenceObservation, Winner},
    split::Split,
    transitivity::TransitivityReport,
};

mod bigram;
pub mod config;
mod dataset;
mod error;
mod observation;
mod split;
mod transitivity;
