//! Low-dimensional embedding of bigram pairs.
//!
//! A pair is represented by the difference of its bigrams' feature vectors. Pairs are
//! unordered, so `d` and `-d` denote the same comparison: the principal components are
//! fitted on both signs (which centers the data at the origin), and distances take the
//! nearer of the two orientations.

use keycomfort_stats::pca::{Pca, euclidean_distance};

#[derive(Debug, Clone)]
pub struct PairProjection {
    pca: Pca,
}

impl PairProjection {
    /// Fits `n_components` principal components to the pair differences.
    ///
    /// Returns `None` when `differences` is empty or has zero dimensions.
    #[must_use]
    pub fn fit(differences: &[Vec<f64>], n_components: usize) -> Option<Self> {
        let symmetric: Vec<Vec<f64>> = differences
            .iter()
            .flat_map(|d| [d.clone(), d.iter().map(|x| -x).collect()])
            .collect();
        Pca::fit(&symmetric, n_components).map(|pca| Self { pca })
    }

    #[must_use]
    pub fn project(&self, difference: &[f64]) -> Vec<f64> {
        self.pca.project(difference)
    }

    #[must_use]
    pub fn explained_variance(&self) -> &[f64] {
        self.pca.explained_variance()
    }
}

/// Distance between two projected pairs, ignoring orientation.
#[must_use]
pub fn pair_distance(a: &[f64], b: &[f64]) -> f64 {
    let negated: Vec<f64> = b.iter().map(|x| -x).collect();
    euclidean_distance(a, b).min(euclidean_distance(a, &negated))
}
