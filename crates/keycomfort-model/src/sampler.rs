//! Posterior sampling boundary.
//!
//! [`PreferenceModel`](crate::PreferenceModel) only builds a [`LogDensity`] and hands it
//! to a [`PosteriorSampler`]. Any gradient-based sampler that returns per-chain draws
//! with divergence and tree-depth counts satisfies the contract; [`HmcSampler`] is the
//! built-in implementation.
//!
//! [`HmcSampler`]: crate::HmcSampler

use std::time::{Duration, Instant};

use crate::{config::ModelConfig, likelihood::LogDensity};

/// Run settings passed to a sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSettings {
    pub n_chains: usize,
    pub n_warmup: usize,
    pub n_draws: usize,
    pub max_tree_depth: u32,
    pub target_accept: f64,
    pub seed: u64,
    /// Sampling must stop with [`SamplerError::Timeout`] once this instant has passed
    pub deadline: Option<Instant>,
}

impl SamplerSettings {
    /// Settings for one fit starting now.
    #[must_use]
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            n_chains: config.n_chains,
            n_warmup: config.n_warmup,
            n_draws: config.n_draws,
            max_tree_depth: config.max_tree_depth,
            target_accept: config.target_accept,
            seed: config.seed,
            deadline: config.timeout().map(|t| Instant::now() + t),
        }
    }
}

/// Retained draws and sampler statistics of one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    /// `draws[t][j]` is parameter `j` at draw `t`
    pub draws: Vec<Vec<f64>>,
    /// Divergent transitions after warmup
    pub divergences: usize,
    /// Post-warmup iterations whose trajectory hit the tree-depth cap
    pub tree_depth_hits: usize,
    /// Adapted step size
    pub step_size: f64,
    pub mean_accept: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerOutput {
    pub chains: Vec<ChainOutput>,
}

impl SamplerOutput {
    /// Draws of parameter `index`, one vector per chain.
    #[must_use]
    pub fn parameter(&self, index: usize) -> Vec<Vec<f64>> {
        self.chains
            .iter()
            .map(|c| c.draws.iter().map(|d| d[index]).collect())
            .collect()
    }

    #[must_use]
    pub fn total_draws(&self) -> usize {
        self.chains.iter().map(|c| c.draws.len()).sum()
    }

    #[must_use]
    pub fn divergences(&self) -> usize {
        self.chains.iter().map(|c| c.divergences).sum()
    }

    #[must_use]
    pub fn tree_depth_hits(&self) -> usize {
        self.chains.iter().map(|c| c.tree_depth_hits).sum()
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum SamplerError {
    #[display("sampling exceeded the time limit after {elapsed:?}")]
    Timeout { elapsed: Duration },
    #[display("chain {chain}: log density is not finite at the initial point")]
    NonFiniteInitialDensity { chain: usize },
    #[display("chain {chain} panicked")]
    ChainPanicked { chain: usize },
    #[display("sampler returned {found} chains, expected {expected}")]
    ChainCount { expected: usize, found: usize },
}

pub trait PosteriorSampler: Sync {
    /// Draws from `target` according to `settings`.
    fn sample(
        &self,
        target: &dyn LogDensity,
        settings: &SamplerSettings,
    ) -> Result<SamplerOutput, SamplerError>;
}
