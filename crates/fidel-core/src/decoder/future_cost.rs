//! Optimistic estimate of what the uncovered part of a sentence can add.
//!
//! Every translation option (a candidate, or a pass-through for a single
//! word without candidates) gets an upper bound on the score it can ever
//! contribute: its exact table and penalty terms, the most favourable LM
//! score per emitted token, and the most favourable distortion charge.
//! Each source position takes the best per-word share of any option
//! covering it. Summing the shares of the uncovered positions bounds any
//! completion from above.
//!
//! The raw bound can be negative, which would put `future_cost` below
//! `score`. Adding the same constant (the negative parts of every share)
//! to each hypothesis of the sentence fixes that without changing how
//! hypotheses rank against each other:
//!
//! ```text
//! estimate = Σ_uncovered max(share, 0) + Σ_covered max(-share, 0) + eos term
//! ```

use crate::candidates::CandidateSet;
use crate::phrase::{Span, WordId};

use super::coverage::Coverage;
use super::features::FeatureWeights;

/// Largest value of `weight * x` for `x` in `[lo, hi]`.
pub fn weighted_bound(weight: f64, lo: f64, hi: f64) -> f64 {
    if weight > 0.0 {
        weight * hi
    } else if weight < 0.0 {
        weight * lo
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct FutureCost {
    share: Vec<f64>,
    /// Bound on the weighted `</s>` score, 0 when it is never scored.
    eos: f64,
}

impl FutureCost {
    /// `lm_bounds` is the (min, max) single-token conditional
    /// log-probability of the model.
    pub fn new(
        source: &[WordId],
        candidates: &CandidateSet,
        weights: &FeatureWeights,
        lm_bounds: (f64, f64),
        scores_eos: bool,
        distortion_limit: usize,
    ) -> Self {
        let n = source.len();
        let per_token = weighted_bound(weights.lm(), lm_bounds.0, lm_bounds.1);
        let distortion = weighted_bound(weights.distortion(), 0.0, distortion_limit as f64);
        let fixed = weights.phrase_penalty() + distortion;
        let max_len = candidates.max_source_len().max(1);

        let mut share = vec![f64::NEG_INFINITY; n];
        for start in 0..n {
            for end in start + 1..=n.min(start + max_len) {
                let len = end - start;
                let options = candidates.get(&Span::new(source, start..end));
                let best = if options.is_empty() {
                    if len > 1 {
                        continue;
                    }
                    weights.unknown_word() + per_token + fixed
                } else {
                    options
                        .iter()
                        .map(|c| {
                            weights.tm_dot(&c.features) + per_token * c.target.len() as f64 + fixed
                        })
                        .fold(f64::NEG_INFINITY, f64::max)
                };
                let per_word = best / len as f64;
                for s in &mut share[start..end] {
                    *s = s.max(per_word);
                }
            }
        }
        Self {
            share,
            eos: if scores_eos { per_token } else { 0.0 },
        }
    }

    pub fn estimate(&self, coverage: &Coverage) -> f64 {
        let mut total = 0.0;
        let mut complete = true;
        for (pos, &share) in self.share.iter().enumerate() {
            if coverage.is_covered(pos) {
                total += (-share).max(0.0);
            } else {
                complete = false;
                total += share.max(0.0);
            }
        }
        total
            + if complete {
                (-self.eos).max(0.0)
            } else {
                self.eos.max(0.0)
            }
    }

    /// Per-position shares, for diagnostics.
    pub fn shares(&self) -> &[f64] {
        &self.share
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::Candidate;
    use crate::phrase::Phrase;

    #[test]
    fn weighted_bound_picks_the_favourable_end() {
        assert_eq!(weighted_bound(2.0, -3.0, -1.0), -2.0);
        assert_eq!(weighted_bound(-2.0, -3.0, -1.0), 6.0);
        assert_eq!(weighted_bound(0.0, f64::NEG_INFINITY, 0.0), 0.0);
    }

    #[test]
    fn shares_take_best_option_per_word() {
        let source = [1, 2, 3];
        let mut set = CandidateSet::new(1, 0);
        set.insert(Phrase::from(vec![1, 2]), Candidate::new(vec![7u32], vec![4.0]));
        set.insert(Phrase::from(vec![2]), Candidate::new(vec![8u32], vec![-1.0]));
        let w = FeatureWeights::new(-10.0, 0.0, 0.0, 0.0, &[1.0]);
        let fc = FutureCost::new(&source, &set, &w, (-99.0, 0.0), false, 2);
        assert_eq!(fc.shares(), &[2.0, 2.0, -10.0]);

        let empty = Coverage::new(3);
        assert_eq!(fc.estimate(&empty), 4.0);
        let full = empty.with(0..3);
        assert_eq!(fc.estimate(&full), 10.0);
    }

    #[test]
    fn estimate_never_negative() {
        let source = [1, 2];
        let set = CandidateSet::new(0, 0);
        let w = FeatureWeights::new(-3.0, -1.0, 0.5, -0.5, &[]);
        let fc = FutureCost::new(&source, &set, &w, (-5.0, -0.1), true, 3);
        for cov in [Coverage::new(2), Coverage::new(2).with(0..1), Coverage::new(2).with(0..2)] {
            assert!(fc.estimate(&cov) >= 0.0);
        }
    }
}
