//! Bigram feature extraction for preference models.
//!
//! # Overview
//!
//! Comfort models never see bigrams directly. They see [`FeatureVector`]s: standardized
//! ergonomic measurements of a bigram on a keyboard [`Layout`], in the column order
//! declared by a [`FeatureSet`].
//!
//! - [`source`] - raw measurements ([`BigramFeatureSource`] implementations)
//! - [`FeatureSet`] - base features, interaction terms, and control features, with the
//!   interaction closure checked at construction
//! - [`FeatureStore`] - standardization over the layout's bigram population plus a
//!   per-`(bigram, signature)` cache
//! - [`BigramFrequencies`] - corpus frequencies, used by the frequency source and by
//!   per-key score aggregation
//!
//! # Example
//!
//! ```
//! use keycomfort_features::{FeatureSet, FeatureStore, Layout, source};
//!
//! let store = FeatureStore::new(Layout::qwerty_left(), source::all_bigram_feature_sources(None))?;
//! let set = FeatureSet::new(vec!["same_finger".into(), "row_span".into()], vec![], vec![])?;
//! let qa = store.vector("qa".parse()?, &set)?;
//! let sd = store.vector("sd".parse()?, &set)?;
//! assert!(qa.get("same_finger") > sd.get("same_finger"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use self::{
    error::{CacheError, FeatureError},
    feature_set::{Candidate, FeatureSet, Interaction},
    frequency::BigramFrequencies,
    layout::{Finger, Hand, KeyPosition, Layout},
    source::{BigramFeatureSource, BoxedBigramFeatureSource},
    store::{FeatureStore, FeatureVector, Signature},
};

mod error;
mod feature_set;
mod frequency;
mod layout;
pub mod source;
mod store;
