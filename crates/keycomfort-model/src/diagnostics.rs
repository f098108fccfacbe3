//! Post-hoc convergence checks on sampler output.

use keycomfort_stats::diagnostics::{effective_sample_size, split_rhat};
use serde::{Deserialize, Serialize};

use crate::{config::ModelConfig, sampler::SamplerOutput};

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConvergenceError {
    #[display("parameter '{parameter}' has split R-hat {rhat:.4}, above the threshold {threshold}")]
    RHat {
        parameter: String,
        rhat: f64,
        threshold: f64,
    },
    #[display(
        "{divergences} of {draws} post-warmup transitions diverged ({fraction:.4}), above the allowed fraction {threshold}"
    )]
    Divergences {
        divergences: usize,
        draws: usize,
        fraction: f64,
        threshold: f64,
    },
}

/// Diagnostics stored with a [`TrainedModel`](crate::TrainedModel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceDiagnostics {
    pub n_chains: usize,
    pub total_draws: usize,
    pub divergences: usize,
    pub divergence_fraction: f64,
    pub tree_depth_hits: usize,
    pub max_rhat: f64,
    /// Parameter with the largest R-hat
    pub worst_parameter: String,
    pub min_ess: f64,
    pub step_sizes: Vec<f64>,
    pub mean_accept: Vec<f64>,
}

/// Per-parameter R-hat and ESS, in parameter order.
#[derive(Debug, Clone)]
pub(crate) struct ParameterDiagnostics {
    pub rhat: Vec<f64>,
    pub ess: Vec<f64>,
}

/// Computes diagnostics and fails if any threshold in `config` is exceeded.
///
/// Divergences at or below `max_divergence_fraction` of the draws are logged as a
/// warning; R-hat above `max_rhat` for any parameter is always fatal.
pub(crate) fn assess(
    output: &SamplerOutput,
    names: &[String],
    config: &ModelConfig,
) -> Result<(ConvergenceDiagnostics, ParameterDiagnostics), ConvergenceError> {
    let total_draws = output.total_draws();
    let divergences = output.divergences();
    #[expect(clippy::cast_precision_loss)]
    let divergence_fraction = if total_draws == 0 {
        0.0
    } else {
        divergences as f64 / total_draws as f64
    };
    if divergence_fraction > config.max_divergence_fraction {
        return Err(ConvergenceError::Divergences {
            divergences,
            draws: total_draws,
            fraction: divergence_fraction,
            threshold: config.max_divergence_fraction,
        });
    }
    if divergences > 0 {
        log::warn!(
            "{divergences} divergent transitions ({divergence_fraction:.4} of draws); \
             results may be biased"
        );
    }
    let tree_depth_hits = output.tree_depth_hits();
    if tree_depth_hits > 0 {
        log::warn!("{tree_depth_hits} transitions hit the maximum tree depth");
    }

    let mut rhat = Vec::with_capacity(names.len());
    let mut ess = Vec::with_capacity(names.len());
    for index in 0..names.len() {
        let chains = output.parameter(index);
        rhat.push(split_rhat(&chains));
        ess.push(effective_sample_size(&chains));
    }

    let (worst, max_rhat) = rhat
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, 1.0));
    let worst_parameter = names.get(worst).cloned().unwrap_or_default();
    if max_rhat.is_nan() || max_rhat > config.max_rhat {
        return Err(ConvergenceError::RHat {
            parameter: worst_parameter,
            rhat: max_rhat,
            threshold: config.max_rhat,
        });
    }
    let min_ess = ess.iter().copied().fold(f64::INFINITY, f64::min);
    log::debug!("max R-hat {max_rhat:.4} ({worst_parameter}), min ESS {min_ess:.0}");

    let diagnostics = ConvergenceDiagnostics {
        n_chains: output.chains.len(),
        total_draws,
        divergences,
        divergence_fraction,
        tree_depth_hits,
        max_rhat,
        worst_parameter,
        min_ess,
        step_sizes: output.chains.iter().map(|c| c.step_size).collect(),
        mean_accept: output.chains.iter().map(|c| c.mean_accept).collect(),
    };
    Ok((diagnostics, ParameterDiagnostics { rhat, ess }))
}

#[cfg(test)]
mod tests {
    use crate::sampler::ChainOutput;

    use super::*;

    fn chain(values: &[f64], divergences: usize) -> ChainOutput {
        ChainOutput {
            draws: values.iter().map(|&v| vec![v]).collect(),
            divergences,
            tree_depth_hits: 0,
            step_size: 0.5,
            mean_accept: 0.8,
        }
    }

    fn names() -> Vec<String> {
        vec!["w".to_owned()]
    }

    #[test]
    fn test_disagreeing_chains_fail_rhat() {
        let output = SamplerOutput {
            chains: vec![
                chain(&[0.0, 0.1, -0.1, 0.05, 0.0, 0.1], 0),
                chain(&[5.0, 5.1, 4.9, 5.05, 5.0, 5.1], 0),
            ],
        };
        let err = assess(&output, &names(), &ModelConfig::default()).unwrap_err();
        assert!(matches!(err, ConvergenceError::RHat { ref parameter, .. } if parameter == "w"));
    }

    #[test]
    fn test_divergence_fraction_threshold() {
        let values = [0.0, 0.3, -0.2, 0.1, 0.2, -0.1, 0.05, -0.05];
        let output = SamplerOutput {
            chains: vec![chain(&values, 1), chain(&values, 0)],
        };
        let strict = ModelConfig {
            max_rhat: 2.0,
            ..ModelConfig::default()
        };
        assert!(matches!(
            assess(&output, &names(), &strict),
            Err(ConvergenceError::Divergences { divergences: 1, draws: 16, .. })
        ));
        let lenient = ModelConfig {
            max_rhat: 2.0,
            max_divergence_fraction: 0.1,
            ..ModelConfig::default()
        };
        let (diagnostics, _) = assess(&output, &names(), &lenient).unwrap();
        assert_eq!(diagnostics.divergences, 1);
    }
}
