//! Standardized, cached feature vectors.
//!
//! # Computation
//!
//! ```text
//! raw source value (per bigram)
//!     ↓ standardize: (raw - mean) / std over every bigram of the layout
//! standardized base / control value
//!     ↓ interaction = product of standardized component values
//! FeatureVector (columns in FeatureSet order)
//! ```
//!
//! Interactions are always products of standardized values, never of raw ones, so
//! weight magnitudes of interactions are comparable to those of base features.
//!
//! # Caching
//!
//! Vectors are cached per `(bigram, signature)`. The map lock is held only to find or
//! insert a per-key [`OnceLock`]; filling that cell runs outside the map lock, so one
//! thread computes a missing vector while other keys stay available.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, OnceLock, PoisonError, RwLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use keycomfort_core::{Bigram, ConfigError};
use keycomfort_stats::descriptive::DescriptiveStats;
use serde::{Deserialize, Serialize};

use crate::{
    error::{CacheError, FeatureError},
    feature_set::FeatureSet,
    layout::Layout,
    source::{BigramFeatureSource, BigramKeys, BoxedBigramFeatureSource},
};

/// Identifies the columns of a [`FeatureVector`] and the layout they were measured on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub layout: String,
    pub features: String,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = |s: &str| s.get(..12).unwrap_or(s).to_owned();
        write!(f, "{}/{}", short(&self.layout), short(&self.features))
    }
}

/// Feature values of one bigram, in [`FeatureSet::column_names`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    signature: Signature,
    columns: Arc<[String]>,
    values: Vec<f64>,
}

impl FeatureVector {
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<f64> {
        let index = self.columns.iter().position(|c| c == column)?;
        Some(self.values[index])
    }
}

/// Population moments used to standardize one source.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Standardizer {
    mean: f64,
    std_dev: f64,
}

impl Standardizer {
    fn apply(self, raw: f64) -> f64 {
        if self.std_dev > 0.0 {
            (raw - self.mean) / self.std_dev
        } else {
            0.0
        }
    }
}

type CacheKey = (Bigram, Signature);
type CacheCell = Arc<OnceLock<FeatureVector>>;

pub struct FeatureStore {
    layout: Layout,
    layout_fingerprint: String,
    sources: Vec<BoxedBigramFeatureSource>,
    standardizers: HashMap<String, Standardizer>,
    cache: RwLock<HashMap<CacheKey, CacheCell>>,
    computed: AtomicUsize,
}

impl fmt::Debug for FeatureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureStore")
            .field("layout", &self.layout.name)
            .field("sources", &self.sources.len())
            .field("computed", &self.computed_count())
            .finish_non_exhaustive()
    }
}

impl FeatureStore {
    pub fn new(layout: Layout, sources: Vec<BoxedBigramFeatureSource>) -> Result<Self, FeatureError> {
        layout.validate()?;
        let mut store = Self {
            layout_fingerprint: layout.fingerprint(),
            layout,
            sources,
            standardizers: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
            computed: AtomicUsize::new(0),
        };
        store.standardizers = store.population_moments()?;
        Ok(store)
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Ids of every registered source.
    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    /// Replaces the layout; all cached vectors and earlier signatures become stale.
    pub fn set_layout(&mut self, layout: Layout) -> Result<(), FeatureError> {
        layout.validate()?;
        self.layout_fingerprint = layout.fingerprint();
        self.layout = layout;
        self.standardizers = self.population_moments()?;
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        log::debug!("feature store switched to layout '{}'", self.layout.name);
        Ok(())
    }

    /// Checks that every column of `set` names a registered source.
    pub fn validate(&self, set: &FeatureSet) -> Result<(), ConfigError> {
        for id in set.source_ids() {
            if !self.standardizers.contains_key(id) {
                return Err(ConfigError::UnknownFeature {
                    feature: id.to_owned(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn signature(&self, set: &FeatureSet) -> Signature {
        Signature {
            layout: self.layout_fingerprint.clone(),
            features: set.digest(),
        }
    }

    /// Feature vector of `bigram` under `set`, computed on first use.
    pub fn vector(&self, bigram: Bigram, set: &FeatureSet) -> Result<FeatureVector, FeatureError> {
        self.validate(set)?;
        let signature = self.signature(set);
        let keys = self.resolve(bigram)?;
        let cell = self.cell(bigram, &signature);
        Ok(cell
            .get_or_init(|| self.compute(&keys, set, signature))
            .clone())
    }

    /// Feature vectors for several bigrams, in input order.
    pub fn vectors(
        &self,
        bigrams: &[Bigram],
        set: &FeatureSet,
    ) -> Result<Vec<FeatureVector>, FeatureError> {
        bigrams.iter().map(|&b| self.vector(b, set)).collect()
    }

    /// Looks up a previously computed vector without computing it.
    pub fn cached(
        &self,
        bigram: Bigram,
        signature: &Signature,
    ) -> Result<Option<FeatureVector>, CacheError> {
        if signature.layout != self.layout_fingerprint {
            return Err(CacheError::StaleSignature {
                expected: self.layout_fingerprint.clone(),
                found: signature.layout.clone(),
            });
        }
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        Ok(cache
            .get(&(bigram, signature.clone()))
            .and_then(|cell| cell.get().cloned()))
    }

    /// Number of vectors computed (not served from cache) so far.
    #[must_use]
    pub fn computed_count(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    fn cell(&self, bigram: Bigram, signature: &Signature) -> CacheCell {
        let key = (bigram, signature.clone());
        if let Some(cell) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(cell);
        }
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(key).or_default())
    }

    /// Expects `set` to have passed [`FeatureStore::validate`].
    fn compute(&self, keys: &BigramKeys<'_>, set: &FeatureSet, signature: Signature) -> FeatureVector {
        let standardized = |id: &str| -> f64 {
            let source = self.sources.iter().find(|s| s.id() == id);
            match (source, self.standardizers.get(id)) {
                (Some(source), Some(st)) => st.apply(source.extract_raw(keys)),
                _ => 0.0,
            }
        };

        let mut values = Vec::with_capacity(set.len());
        values.extend(set.base().iter().map(|id| standardized(id)));
        values.extend(set.interactions().iter().map(|interaction| {
            interaction
                .components()
                .iter()
                .map(|id| standardized(id))
                .product::<f64>()
        }));
        values.extend(set.controls().iter().map(|id| standardized(id)));

        self.computed.fetch_add(1, Ordering::Relaxed);
        FeatureVector {
            signature,
            columns: set.column_names().into(),
            values,
        }
    }

    fn resolve(&self, bigram: Bigram) -> Result<BigramKeys<'_>, FeatureError> {
        let position = |key: char| {
            self.layout
                .position(key)
                .ok_or_else(|| FeatureError::UnknownKey {
                    bigram: bigram.to_string(),
                    key,
                })
        };
        Ok(BigramKeys {
            bigram,
            first: position(bigram.first())?,
            second: position(bigram.second())?,
        })
    }

    fn population_moments(&self) -> Result<HashMap<String, Standardizer>, FeatureError> {
        let population = self
            .layout
            .bigrams()
            .into_iter()
            .map(|b| self.resolve(b))
            .collect::<Result<Vec<_>, _>>()?;
        let mut moments = HashMap::new();
        for source in &self.sources {
            let stats = DescriptiveStats::new(population.iter().map(|k| source.extract_raw(k)));
            let standardizer = stats.map_or(
                Standardizer {
                    mean: 0.0,
                    std_dev: 0.0,
                },
                |s| Standardizer {
                    mean: s.mean,
                    std_dev: s.std_dev,
                },
            );
            if standardizer.std_dev == 0.0 {
                log::warn!(
                    "feature '{}' is constant on layout '{}'; it standardizes to zero",
                    source.id(),
                    self.layout.name
                );
            }
            moments.insert(source.id().to_owned(), standardizer);
        }
        Ok(moments)
    }
}
