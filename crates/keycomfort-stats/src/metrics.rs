//! Evaluation metrics for probabilistic binary predictions.
//!
//! Every function takes predicted probabilities of the positive outcome together with
//! the observed outcomes, in the same order.

/// Probabilities are clamped to `[EPS, 1 - EPS]` before taking logarithms.
const EPS: f64 = 1e-12;

/// Fraction of outcomes predicted correctly when thresholding at 0.5.
///
/// A probability of exactly 0.5 counts as a prediction of the negative outcome.
/// Returns `None` for empty input.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn accuracy(probabilities: &[f64], outcomes: &[bool]) -> Option<f64> {
    assert_eq!(probabilities.len(), outcomes.len());
    if outcomes.is_empty() {
        return None;
    }
    let correct = probabilities
        .iter()
        .zip(outcomes)
        .filter(|&(&p, &y)| (p > 0.5) == y)
        .count();
    Some(correct as f64 / outcomes.len() as f64)
}

/// Mean Bernoulli log-likelihood of the outcomes (higher is better, at most 0).
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn mean_log_likelihood(probabilities: &[f64], outcomes: &[bool]) -> Option<f64> {
    assert_eq!(probabilities.len(), outcomes.len());
    if outcomes.is_empty() {
        return None;
    }
    let total = probabilities
        .iter()
        .zip(outcomes)
        .map(|(&p, &y)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            if y { p.ln() } else { (1.0 - p).ln() }
        })
        .sum::<f64>();
    Some(total / outcomes.len() as f64)
}

/// Mean log loss (negated [`mean_log_likelihood`]).
#[must_use]
pub fn log_loss(probabilities: &[f64], outcomes: &[bool]) -> Option<f64> {
    mean_log_likelihood(probabilities, outcomes).map(|ll| -ll)
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores receive averaged ranks. Returns `None` unless both outcome classes are
/// present.
///
/// ```
/// use keycomfort_stats::metrics::auc;
///
/// let probs = [0.9, 0.8, 0.3, 0.1];
/// let outcomes = [true, true, false, false];
/// assert_eq!(auc(&probs, &outcomes), Some(1.0));
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn auc(probabilities: &[f64], outcomes: &[bool]) -> Option<f64> {
    assert_eq!(probabilities.len(), outcomes.len());
    let n_pos = outcomes.iter().filter(|&&y| y).count();
    let n_neg = outcomes.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut ranks = vec![0.0; order.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probabilities[order[j + 1]] == probabilities[order[i]] {
            j += 1;
        }
        // ranks are 1-based; tied block [i, j] shares the average rank
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum_pos: f64 = ranks
        .iter()
        .zip(outcomes)
        .filter(|&(_, &y)| y)
        .map(|(r, _)| r)
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}
