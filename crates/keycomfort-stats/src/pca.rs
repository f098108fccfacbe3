//! Principal component analysis.
//!
//! [`Pca::fit`] estimates the covariance matrix of a set of points, decomposes it with a
//! symmetric eigendecomposition and keeps the `n_components` eigenvectors with the
//! largest eigenvalues. Projection is then a plain linear map, so distances in the
//! projected space approximate distances in the original space along the directions of
//! largest variance.
//!
//! Results are deterministic: eigenpairs are ordered by descending eigenvalue (ties by
//! original index) and every component is sign-normalized so that its largest-magnitude
//! coordinate is positive.
//!
//! ```
//! use keycomfort_stats::pca::Pca;
//!
//! // Points spread along the x axis only
//! let points = vec![vec![-2.0, 0.0], vec![-1.0, 0.0], vec![1.0, 0.0], vec![2.0, 0.0]];
//! let pca = Pca::fit(&points, 1).unwrap();
//! let projected = pca.project(&[3.0, 0.0]);
//! assert!((projected[0] - 3.0).abs() < 1e-9);
//! ```

use nalgebra::DMatrix;

/// Fitted principal component projection.
#[derive(Debug, Clone)]
pub struct Pca {
    mean: Vec<f64>,
    components: Vec<Vec<f64>>,
    explained_variance: Vec<f64>,
}

impl Pca {
    /// Fits a projection onto the `n_components` directions of largest variance.
    ///
    /// `n_components` is clamped to the dimensionality of the points. Returns `None`
    /// when `points` is empty, has zero dimensions, or has rows of unequal length.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn fit(points: &[Vec<f64>], n_components: usize) -> Option<Self> {
        let dim = points.first()?.len();
        if dim == 0 || points.iter().any(|p| p.len() != dim) {
            return None;
        }
        let n = points.len() as f64;
        let mean: Vec<f64> = (0..dim)
            .map(|j| points.iter().map(|p| p[j]).sum::<f64>() / n)
            .collect();

        let mut covariance = DMatrix::<f64>::zeros(dim, dim);
        for p in points {
            for i in 0..dim {
                let di = p[i] - mean[i];
                for j in i..dim {
                    covariance[(i, j)] += di * (p[j] - mean[j]);
                }
            }
        }
        for i in 0..dim {
            for j in i..dim {
                let v = covariance[(i, j)] / n;
                covariance[(i, j)] = v;
                covariance[(j, i)] = v;
            }
        }

        let eigen = covariance.symmetric_eigen();
        let mut order: Vec<usize> = (0..dim).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .total_cmp(&eigen.eigenvalues[a])
                .then(a.cmp(&b))
        });

        let n_components = n_components.min(dim);
        let mut components = Vec::with_capacity(n_components);
        let mut explained_variance = Vec::with_capacity(n_components);
        for &idx in order.iter().take(n_components) {
            let mut component: Vec<f64> = eigen.eigenvectors.column(idx).iter().copied().collect();
            let pivot = component
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0);
            if pivot < 0.0 {
                for c in &mut component {
                    *c = -*c;
                }
            }
            components.push(component);
            explained_variance.push(eigen.eigenvalues[idx].max(0.0));
        }

        Some(Self {
            mean,
            components,
            explained_variance,
        })
    }

    /// Projects a point onto the fitted components.
    ///
    /// # Panics
    ///
    /// Panics if `point` has a different dimensionality than the fitted data.
    #[must_use]
    pub fn project(&self, point: &[f64]) -> Vec<f64> {
        assert_eq!(point.len(), self.mean.len(), "dimension mismatch");
        self.components
            .iter()
            .map(|component| {
                component
                    .iter()
                    .zip(point.iter().zip(&self.mean))
                    .map(|(c, (x, m))| c * (x - m))
                    .sum()
            })
            .collect()
    }

    /// Number of retained components.
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Variance captured by each retained component, in descending order.
    #[must_use]
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    /// Per-dimension mean subtracted before projection.
    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }
}

/// Euclidean distance between two equally sized points.
#[must_use]
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
