//! Hierarchical Bradley-Terry log-posterior.
//!
//! For observation `i` by participant `p` comparing `A` and `B`:
//!
//! ```text
//! eta_i      = beta · (f(A) - f(B)) + gamma_p
//! P(A ≻ B)   = sigmoid(eta_i)
//! beta_j     ~ Normal(0, feature_prior_scale)
//! gamma_p    ~ Normal(0, participant_prior_scale)
//! ```
//!
//! The parameter vector is `[beta_0 .. beta_k, gamma_0 .. gamma_P]`. `gamma_p` is a
//! per-participant offset pooled toward zero by the shared prior: participants with few
//! observations stay close to the population.

use crate::design::DesignMatrix;

/// Unnormalized log density with gradient, the contract between a model and a
/// [`PosteriorSampler`](crate::PosteriorSampler).
pub trait LogDensity: Sync {
    fn dim(&self) -> usize;

    /// Returns `log p(theta)` and writes its gradient into `grad`.
    fn log_density_and_gradient(&self, theta: &[f64], grad: &mut [f64]) -> f64;
}

#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + exp(x))` without overflow.
fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

#[derive(Debug)]
pub struct HierarchicalLikelihood<'a> {
    design: &'a DesignMatrix,
    feature_prior_scale: f64,
    participant_prior_scale: f64,
}

impl<'a> HierarchicalLikelihood<'a> {
    #[must_use]
    pub fn new(design: &'a DesignMatrix, feature_prior_scale: f64, participant_prior_scale: f64) -> Self {
        Self {
            design,
            feature_prior_scale,
            participant_prior_scale,
        }
    }

    #[must_use]
    pub fn n_weights(&self) -> usize {
        self.design.n_columns()
    }
}

impl LogDensity for HierarchicalLikelihood<'_> {
    fn dim(&self) -> usize {
        self.design.n_columns() + self.design.n_participants()
    }

    fn log_density_and_gradient(&self, theta: &[f64], grad: &mut [f64]) -> f64 {
        let k = self.n_weights();
        let (beta, gamma) = theta.split_at(k);
        let sb2 = self.feature_prior_scale.powi(2);
        let sg2 = self.participant_prior_scale.powi(2);

        let mut log_p = 0.0;
        for (g, &b) in grad[..k].iter_mut().zip(beta) {
            log_p -= b * b / (2.0 * sb2);
            *g = -b / sb2;
        }
        for (g, &c) in grad[k..].iter_mut().zip(gamma) {
            log_p -= c * c / (2.0 * sg2);
            *g = -c / sg2;
        }

        for ((row, &y), &p) in self
            .design
            .rows
            .iter()
            .zip(&self.design.outcomes)
            .zip(&self.design.participants)
        {
            let eta = row.iter().zip(beta).map(|(x, b)| x * b).sum::<f64>() + gamma[p];
            // log sigmoid(eta) = -softplus(-eta); log(1 - sigmoid(eta)) = -softplus(eta)
            log_p -= if y { softplus(-eta) } else { softplus(eta) };
            let residual = f64::from(u8::from(y)) - sigmoid(eta);
            for (g, x) in grad[..k].iter_mut().zip(row) {
                *g += residual * x;
            }
            grad[k + p] += residual;
        }
        log_p
    }
}
