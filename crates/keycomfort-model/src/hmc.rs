//! Built-in Hamiltonian Monte Carlo sampler.
//!
//! # Algorithm Overview
//!
//! Every chain runs independently on its own thread with its own `Pcg64` stream
//! (`seed + chain`):
//!
//! 1. **Initialize** - parameters drawn uniformly from `[-0.5, 0.5]`
//! 2. **Transition** - draw momentum, integrate Hamilton's equations with the leapfrog
//!    scheme, accept or reject the end point with the Metropolis rule on the energy
//!    change
//! 3. **Adapt (warmup only)** - tune the step size by dual averaging toward
//!    `target_accept`, and estimate a diagonal mass matrix from the middle of warmup
//!
//! # Trajectory Length
//!
//! Each transition integrates for a randomized time `u * π/2` with `u ~ U(0.5, 1.5)`,
//! measured in the whitened coordinates given by the mass matrix. For a roughly
//! Gaussian posterior this is about a quarter period, which decorrelates successive
//! draws; the jitter avoids resonance. The step count is capped at `2^max_tree_depth`;
//! capped transitions are counted as tree-depth hits.
//!
//! # Warmup Schedule
//!
//! ```text
//! |-- 15% --|------------- 75% -------------|-- 10% --|
//!  step size   step size + variance window    step size
//! ```
//!
//! At the end of the variance window the inverse mass matrix is set to the regularized
//! per-parameter variance of the window's draws and step-size adaptation restarts.
//! Warmups shorter than 20 iterations adapt the step size only.
//!
//! # Divergences
//!
//! A transition is divergent when the energy error exceeds 1000 or becomes
//! non-finite. Divergent proposals are rejected; only post-warmup divergences are
//! reported.

use std::{f64::consts::FRAC_PI_2, thread, time::Instant};

use rand::{Rng, SeedableRng as _};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;

use crate::{
    likelihood::LogDensity,
    sampler::{ChainOutput, PosteriorSampler, SamplerError, SamplerOutput, SamplerSettings},
};

const MAX_ENERGY_ERROR: f64 = 1000.0;
const INIT_RADIUS: f64 = 0.5;
const INIT_ATTEMPTS: usize = 100;
const MIN_MASS_ADAPTATION_WARMUP: usize = 20;

// Dual averaging constants (Hoffman & Gelman, 2014)
const DA_GAMMA: f64 = 0.05;
const DA_T0: f64 = 10.0;
const DA_KAPPA: f64 = 0.75;

/// Hamiltonian Monte Carlo with step-size and diagonal mass-matrix adaptation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmcSampler;

impl PosteriorSampler for HmcSampler {
    fn sample(
        &self,
        target: &dyn LogDensity,
        settings: &SamplerSettings,
    ) -> Result<SamplerOutput, SamplerError> {
        let started = Instant::now();
        let results = thread::scope(|s| {
            let handles = (0..settings.n_chains)
                .zip(0u64..)
                .map(|(chain, offset)| {
                    let seed = settings.seed.wrapping_add(offset);
                    s.spawn(move || run_chain(target, settings, chain, seed, started))
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .enumerate()
                .map(|(chain, handle)| {
                    handle
                        .join()
                        .unwrap_or(Err(SamplerError::ChainPanicked { chain }))
                })
                .collect::<Vec<_>>()
        });
        let chains = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(SamplerOutput { chains })
    }
}

#[derive(Debug, Clone)]
struct Point {
    theta: Vec<f64>,
    grad: Vec<f64>,
    log_p: f64,
}

impl Point {
    fn at(target: &dyn LogDensity, theta: Vec<f64>) -> Self {
        let mut grad = vec![0.0; theta.len()];
        let log_p = target.log_density_and_gradient(&theta, &mut grad);
        Self { theta, grad, log_p }
    }
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    accept_prob: f64,
    divergent: bool,
    hit_max_depth: bool,
}

/// Step-size adaptation by dual averaging of the acceptance statistic.
#[derive(Debug, Clone)]
struct DualAveraging {
    target: f64,
    mu: f64,
    h_bar: f64,
    log_step_bar: f64,
    count: f64,
}

impl DualAveraging {
    fn new(step_size: f64, target: f64) -> Self {
        Self {
            target,
            mu: (10.0 * step_size).ln(),
            h_bar: 0.0,
            log_step_bar: 0.0,
            count: 0.0,
        }
    }

    /// Records one acceptance probability and returns the next step size.
    fn update(&mut self, accept_prob: f64) -> f64 {
        self.count += 1.0;
        let m = self.count;
        let w = 1.0 / (m + DA_T0);
        self.h_bar = (1.0 - w) * self.h_bar + w * (self.target - accept_prob);
        let log_step = self.mu - m.sqrt() / DA_GAMMA * self.h_bar;
        let eta = m.powf(-DA_KAPPA);
        self.log_step_bar = eta * log_step + (1.0 - eta) * self.log_step_bar;
        log_step.exp()
    }

    fn final_step_size(&self) -> f64 {
        self.log_step_bar.exp()
    }
}

struct Chain<'a> {
    target: &'a dyn LogDensity,
    rng: Pcg64,
    point: Point,
    inv_mass: Vec<f64>,
    max_steps: usize,
}

impl Chain<'_> {
    fn kinetic(&self, momentum: &[f64]) -> f64 {
        momentum
            .iter()
            .zip(&self.inv_mass)
            .map(|(p, m)| p * p * m)
            .sum::<f64>()
            / 2.0
    }

    fn draw_momentum(&mut self) -> Vec<f64> {
        let inv_mass = &self.inv_mass;
        let rng = &mut self.rng;
        inv_mass
            .iter()
            .map(|m| rng.sample::<f64, _>(StandardNormal) / m.sqrt())
            .collect()
    }

    fn leapfrog(&self, point: &Point, momentum: &mut [f64], step_size: f64) -> Point {
        for (p, g) in momentum.iter_mut().zip(&point.grad) {
            *p += 0.5 * step_size * g;
        }
        let theta = point
            .theta
            .iter()
            .zip(momentum.iter())
            .zip(&self.inv_mass)
            .map(|((x, p), m)| x + step_size * m * p)
            .collect();
        let next = Point::at(self.target, theta);
        for (p, g) in momentum.iter_mut().zip(&next.grad) {
            *p += 0.5 * step_size * g;
        }
        next
    }

    fn transition(&mut self, step_size: f64) -> Transition {
        let momentum0 = self.draw_momentum();
        let h0 = -self.point.log_p + self.kinetic(&momentum0);

        let jitter: f64 = self.rng.random_range(0.5..1.5);
        let wanted = (jitter * FRAC_PI_2 / step_size).ceil();
        #[expect(clippy::cast_precision_loss)]
        let hit_max_depth = wanted > self.max_steps as f64;
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n_steps = if hit_max_depth {
            self.max_steps
        } else {
            (wanted as usize).max(1)
        };

        let mut momentum = momentum0;
        let mut proposal = self.point.clone();
        for _ in 0..n_steps {
            proposal = self.leapfrog(&proposal, &mut momentum, step_size);
            if !proposal.log_p.is_finite() {
                break;
            }
        }
        let energy_error = -proposal.log_p + self.kinetic(&momentum) - h0;
        let divergent = !energy_error.is_finite() || energy_error > MAX_ENERGY_ERROR;
        let accept_prob = if divergent {
            0.0
        } else {
            (-energy_error).exp().min(1.0)
        };
        if self.rng.random::<f64>() < accept_prob {
            self.point = proposal;
        }
        Transition {
            accept_prob,
            divergent,
            hit_max_depth,
        }
    }

    /// Doubles or halves `step_size` until a single leapfrog step crosses an
    /// acceptance probability of 0.5.
    fn find_reasonable_step_size(&mut self, mut step_size: f64) -> f64 {
        let accept = |chain: &mut Self, step_size: f64| -> f64 {
            let mut momentum = chain.draw_momentum();
            let h0 = -chain.point.log_p + chain.kinetic(&momentum);
            let next = chain.leapfrog(&chain.point, &mut momentum, step_size);
            let h1 = -next.log_p + chain.kinetic(&momentum);
            let a = (h0 - h1).exp();
            if a.is_finite() { a } else { 0.0 }
        };
        let increase = accept(self, step_size) > 0.5;
        for _ in 0..50 {
            let candidate = if increase {
                step_size * 2.0
            } else {
                step_size / 2.0
            };
            let a = accept(self, candidate);
            if increase && a <= 0.5 {
                break;
            }
            step_size = candidate;
            if !increase && a > 0.5 {
                break;
            }
        }
        step_size
    }
}

fn initial_point(
    target: &dyn LogDensity,
    rng: &mut Pcg64,
    chain: usize,
) -> Result<Point, SamplerError> {
    for _ in 0..INIT_ATTEMPTS {
        let theta = (0..target.dim())
            .map(|_| rng.random_range(-INIT_RADIUS..=INIT_RADIUS))
            .collect();
        let point = Point::at(target, theta);
        if point.log_p.is_finite() && point.grad.iter().all(|g| g.is_finite()) {
            return Ok(point);
        }
    }
    Err(SamplerError::NonFiniteInitialDensity { chain })
}

/// Regularized variance estimate used as the inverse mass matrix.
#[expect(clippy::cast_precision_loss)]
fn regularized_variance(window: &[Vec<f64>], dim: usize) -> Vec<f64> {
    let n = window.len() as f64;
    (0..dim)
        .map(|j| {
            let mean = window.iter().map(|d| d[j]).sum::<f64>() / n;
            let var = window.iter().map(|d| (d[j] - mean).powi(2)).sum::<f64>() / (n - 1.0);
            (n / (n + 5.0)) * var + 1e-3 * (5.0 / (n + 5.0))
        })
        .collect()
}

fn check_deadline(settings: &SamplerSettings, started: Instant) -> Result<(), SamplerError> {
    match settings.deadline {
        Some(deadline) if Instant::now() >= deadline => Err(SamplerError::Timeout {
            elapsed: started.elapsed(),
        }),
        _ => Ok(()),
    }
}

fn run_chain(
    target: &dyn LogDensity,
    settings: &SamplerSettings,
    chain_index: usize,
    seed: u64,
    started: Instant,
) -> Result<ChainOutput, SamplerError> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let point = initial_point(target, &mut rng, chain_index)?;
    let dim = target.dim();
    let mut chain = Chain {
        target,
        rng,
        point,
        inv_mass: vec![1.0; dim],
        max_steps: 1usize << settings.max_tree_depth,
    };

    let n_warmup = settings.n_warmup;
    let (window_start, window_end) = if n_warmup >= MIN_MASS_ADAPTATION_WARMUP {
        let start = n_warmup * 15 / 100;
        let end = n_warmup - n_warmup / 10;
        (start, end)
    } else {
        (n_warmup, n_warmup)
    };

    let mut step_size = chain.find_reasonable_step_size(1.0);
    let mut adaptation = DualAveraging::new(step_size, settings.target_accept);
    let mut window = Vec::with_capacity(window_end - window_start);
    for iteration in 0..n_warmup {
        check_deadline(settings, started)?;
        let transition = chain.transition(step_size);
        step_size = adaptation.update(transition.accept_prob);
        if (window_start..window_end).contains(&iteration) {
            window.push(chain.point.theta.clone());
            if iteration + 1 == window_end && window.len() >= 2 {
                chain.inv_mass = regularized_variance(&window, dim);
                step_size = chain.find_reasonable_step_size(step_size);
                adaptation = DualAveraging::new(step_size, settings.target_accept);
            }
        }
    }
    if n_warmup > 0 {
        step_size = adaptation.final_step_size();
    }
    log::debug!("chain {chain_index}: adapted step size {step_size:.4}");

    let mut draws = Vec::with_capacity(settings.n_draws);
    let mut divergences = 0;
    let mut tree_depth_hits = 0;
    let mut accept_sum = 0.0;
    for _ in 0..settings.n_draws {
        check_deadline(settings, started)?;
        let transition = chain.transition(step_size);
        divergences += usize::from(transition.divergent);
        tree_depth_hits += usize::from(transition.hit_max_depth);
        accept_sum += transition.accept_prob;
        draws.push(chain.point.theta.clone());
    }
    #[expect(clippy::cast_precision_loss)]
    let mean_accept = accept_sum / settings.n_draws.max(1) as f64;
    Ok(ChainOutput {
        draws,
        divergences,
        tree_depth_hits,
        step_size,
        mean_accept,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// Independent normals with the given means and scales.
    struct Gaussian {
        mean: Vec<f64>,
        scale: Vec<f64>,
    }

    impl LogDensity for Gaussian {
        fn dim(&self) -> usize {
            self.mean.len()
        }

        fn log_density_and_gradient(&self, theta: &[f64], grad: &mut [f64]) -> f64 {
            let mut log_p = 0.0;
            for (i, g) in grad.iter_mut().enumerate() {
                let z = (theta[i] - self.mean[i]) / self.scale[i];
                log_p -= 0.5 * z * z;
                *g = -z / self.scale[i];
            }
            log_p
        }
    }

    fn settings(seed: u64) -> SamplerSettings {
        SamplerSettings {
            n_chains: 2,
            n_warmup: 300,
            n_draws: 600,
            max_tree_depth: 8,
            target_accept: 0.8,
            seed,
            deadline: None,
        }
    }

    #[expect(clippy::cast_precision_loss)]
    fn moments(output: &SamplerOutput, index: usize) -> (f64, f64) {
        let draws: Vec<f64> = output.parameter(index).into_iter().flatten().collect();
        let n = draws.len() as f64;
        let mean = draws.iter().sum::<f64>() / n;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_recovers_gaussian_moments() {
        let target = Gaussian {
            mean: vec![1.0, -2.0],
            scale: vec![0.1, 3.0],
        };
        let output = HmcSampler.sample(&target, &settings(7)).unwrap();
        assert_eq!(output.chains.len(), 2);
        assert_eq!(output.total_draws(), 1200);
        let (m0, s0) = moments(&output, 0);
        let (m1, s1) = moments(&output, 1);
        assert!((m0 - 1.0).abs() < 0.03, "mean {m0}");
        assert!((s0 - 0.1).abs() < 0.03, "std {s0}");
        assert!((m1 + 2.0).abs() < 0.8, "mean {m1}");
        assert!((s1 - 3.0).abs() < 0.8, "std {s1}");
        assert_eq!(output.divergences(), 0);
    }

    #[test]
    fn test_is_deterministic_per_seed() {
        let target = Gaussian {
            mean: vec![0.0],
            scale: vec![1.0],
        };
        let a = HmcSampler.sample(&target, &settings(3)).unwrap();
        let b = HmcSampler.sample(&target, &settings(3)).unwrap();
        let c = HmcSampler.sample(&target, &settings(4)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let target = Gaussian {
            mean: vec![0.0],
            scale: vec![1.0],
        };
        let mut settings = settings(1);
        settings.deadline = Instant::now().checked_sub(Duration::from_secs(1));
        assert!(settings.deadline.is_some());
        assert!(matches!(
            HmcSampler.sample(&target, &settings),
            Err(SamplerError::Timeout { .. })
        ));
    }

    #[test]
    fn test_dual_averaging_moves_toward_target() {
        let mut da = DualAveraging::new(1.0, 0.8);
        let mut step = 1.0;
        for _ in 0..50 {
            step = da.update(0.2);
        }
        assert!(step < 1.0);
        assert!(da.final_step_size() < 1.0);
    }
}
