use std::collections::BTreeSet;

use keycomfort_core::{Bigram, BigramPair};
use rand::{SeedableRng as _, seq::index};
use rand_pcg::Pcg64;

use crate::error::RecommendationError;

/// Unordered pairs of `bigrams` that have not been compared yet.
///
/// Pairs are enumerated in canonical order. When more than `max_candidates` remain, a
/// seeded subsample of that size is drawn; the subsample keeps canonical order, so the
/// result depends only on the inputs and `seed`.
pub fn candidate_pool(
    bigrams: &[Bigram],
    observed: &BTreeSet<BigramPair>,
    max_candidates: usize,
    seed: u64,
) -> Result<Vec<BigramPair>, RecommendationError> {
    let unique: BTreeSet<Bigram> = bigrams.iter().copied().collect();
    let unique: Vec<Bigram> = unique.into_iter().collect();
    let mut total_pairs = 0;
    let mut pool = Vec::new();
    for (i, &a) in unique.iter().enumerate() {
        for &b in &unique[i + 1..] {
            let Some(pair) = BigramPair::new(a, b) else {
                continue;
            };
            total_pairs += 1;
            if !observed.contains(&pair) {
                pool.push(pair);
            }
        }
    }
    if pool.is_empty() {
        return Err(RecommendationError::EmptyCandidatePool {
            n_bigrams: unique.len(),
            total_pairs,
        });
    }
    log::debug!(
        "{} of {total_pairs} pairs not yet observed",
        pool.len()
    );
    if pool.len() <= max_candidates {
        return Ok(pool);
    }

    let mut rng = Pcg64::seed_from_u64(seed);
    let mut picked = index::sample(&mut rng, pool.len(), max_candidates).into_vec();
    picked.sort_unstable();
    log::info!(
        "subsampled {max_candidates} of {} candidate pairs (seed {seed})",
        pool.len()
    );
    Ok(picked.into_iter().map(|i| pool[i]).collect())
}
