//! Convergence diagnostics for Markov chain Monte Carlo output.
//!
//! Both diagnostics operate on the draws of a single scalar parameter, given as one
//! vector per chain (all chains must have the same length).
//!
//! - [`split_rhat`] - potential scale reduction factor computed on half-chains, so that
//!   a chain drifting between its first and second half is detected as well as chains
//!   that disagree with each other
//! - [`effective_sample_size`] - number of independent draws carrying the same
//!   information as the autocorrelated chains, using Geyer's initial monotone sequence
//!
//! Values of R-hat close to 1.0 indicate that all (half-)chains sample the same
//! distribution; the conventional fatal threshold is 1.01.

use crate::descriptive::{mean, sample_variance};

/// Splits every chain in half, dropping the middle draw of odd-length chains.
fn split_chains(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    chains
        .iter()
        .flat_map(|chain| {
            let half = chain.len() / 2;
            let (first, rest) = chain.split_at(half);
            let second = &rest[rest.len() - half..];
            [first, second]
        })
        .collect()
}

/// Within-chain variance `W` and the pooled variance estimate `var+`.
#[expect(clippy::cast_precision_loss)]
fn variance_components(chains: &[&[f64]]) -> Option<(f64, f64)> {
    let n = chains.first()?.len();
    if n < 2 || chains.iter().any(|c| c.len() != n) {
        return None;
    }
    let chain_means = chains.iter().map(|c| mean(c)).collect::<Option<Vec<_>>>()?;
    let within = chains
        .iter()
        .map(|c| sample_variance(c))
        .collect::<Option<Vec<_>>>()?;
    let w = mean(&within)?;
    let between_over_n = if chains.len() > 1 {
        sample_variance(&chain_means)?
    } else {
        0.0
    };
    let n = n as f64;
    let var_plus = (n - 1.0) / n * w + between_over_n;
    Some((w, var_plus))
}

/// Split potential scale reduction statistic (R-hat).
///
/// Returns `f64::INFINITY` when the chains are too short to be split (fewer than four
/// draws each) or when within-chain variance vanishes while chain means disagree,
/// and `1.0` when every draw is identical.
///
/// ```
/// use keycomfort_stats::diagnostics::split_rhat;
///
/// // Two chains stuck in different places
/// let chains = vec![vec![0.0, 0.1, 0.0, 0.1], vec![5.0, 5.1, 5.0, 5.1]];
/// assert!(split_rhat(&chains) > 1.1);
/// ```
#[must_use]
pub fn split_rhat(chains: &[Vec<f64>]) -> f64 {
    let split = split_chains(chains);
    let Some((w, var_plus)) = variance_components(&split) else {
        return f64::INFINITY;
    };
    if w <= 0.0 {
        return if var_plus <= 0.0 { 1.0 } else { f64::INFINITY };
    }
    (var_plus / w).sqrt()
}

/// Autocovariance of `chain` at `lag`, normalized by the chain length.
#[expect(clippy::cast_precision_loss)]
fn autocovariance(chain: &[f64], chain_mean: f64, lag: usize) -> f64 {
    let n = chain.len();
    (0..n - lag)
        .map(|i| (chain[i] - chain_mean) * (chain[i + lag] - chain_mean))
        .sum::<f64>()
        / n as f64
}

/// Bulk effective sample size over all chains.
///
/// Autocorrelations are combined across chains and truncated with Geyer's initial
/// positive sequence, made monotone, so the estimate never exceeds the total draw
/// count by more than the antithetic correction allows. Degenerate input (constant
/// draws, chains of fewer than four draws) returns the total draw count.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn effective_sample_size(chains: &[Vec<f64>]) -> f64 {
    let split = split_chains(chains);
    let total = split.iter().map(|c| c.len()).sum::<usize>() as f64;
    let Some((w, var_plus)) = variance_components(&split) else {
        return total;
    };
    if var_plus <= 0.0 {
        return total;
    }

    let n = split[0].len();
    let means: Vec<f64> = split.iter().map(|c| mean(c).unwrap_or(0.0)).collect();
    let m = split.len() as f64;
    let rho = |lag: usize| -> f64 {
        let mean_autocov = split
            .iter()
            .zip(&means)
            .map(|(c, &mu)| autocovariance(c, mu, lag))
            .sum::<f64>()
            / m;
        1.0 - (w - mean_autocov) / var_plus
    };

    // Geyer's initial monotone sequence over pairs (rho_{2k} + rho_{2k+1}).
    let mut sum_pairs = 0.0;
    let mut previous_pair = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < n {
        let pair = rho(lag) + rho(lag + 1);
        if pair <= 0.0 {
            break;
        }
        let pair = pair.min(previous_pair);
        sum_pairs += pair;
        previous_pair = pair;
        lag += 2;
    }
    let tau = (-1.0 + 2.0 * sum_pairs).max(1.0 / total.log10().max(1.0));
    total / tau
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    use super::*;

    fn white_noise(seed: u64, n: usize) -> Vec<f64> {
        let mut rng = Pcg64::seed_from_u64(seed);
        (0..n).map(|_| rng.random_range(-1.0..1.0)).collect()
    }

    #[test]
    fn test_rhat_near_one_for_independent_chains() {
        let chains: Vec<_> = (0..4).map(|s| white_noise(s, 500)).collect();
        let rhat = split_rhat(&chains);
        assert!((rhat - 1.0).abs() < 0.01, "rhat = {rhat}");
    }

    #[test]
    fn test_rhat_detects_drift_within_chain() {
        let chain: Vec<f64> = (0..200).map(f64::from).collect();
        assert!(split_rhat(&[chain]) > 1.5);
    }

    #[test]
    fn test_rhat_constant_draws() {
        assert!((split_rhat(&[vec![1.0; 10], vec![1.0; 10]]) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rhat_too_short() {
        assert!(split_rhat(&[vec![1.0, 2.0]]).is_infinite());
    }

    #[test]
    fn test_ess_independent_close_to_total() {
        let chains: Vec<_> = (0..4).map(|s| white_noise(s + 10, 1000)).collect();
        let ess = effective_sample_size(&chains);
        assert!(ess > 2500.0, "ess = {ess}");
    }

    #[test]
    fn test_ess_autocorrelated_is_smaller() {
        let mut rng = Pcg64::seed_from_u64(7);
        let chains: Vec<Vec<f64>> = (0..4)
            .map(|_| {
                let mut x = 0.0;
                (0..1000)
                    .map(|_| {
                        x = 0.95 * x + rng.random_range(-1.0..1.0);
                        x
                    })
                    .collect()
            })
            .collect();
        let ess = effective_sample_size(&chains);
        assert!(ess < 1000.0, "ess = {ess}");
    }
}
