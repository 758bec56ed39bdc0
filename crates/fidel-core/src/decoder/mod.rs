//! Phrase-based beam search.
//!
//! `decode` takes a sentence of source ids, its candidate set, a language
//! model and the feature weights, and returns the n-best complete
//! translations. The search itself cannot fail: an unreachable sentence,
//! an empty input or a cancelled run all yield an empty list.

mod coverage;
pub mod explain;
pub mod features;
mod future_cost;
mod hypothesis;
mod nbest;
mod search;
#[cfg(test)]
pub(crate) mod testutil;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::candidates::CandidateSet;
use crate::lm::LanguageModel;
use crate::phrase::WordId;
use crate::settings::settings;

pub use coverage::Coverage;
pub use features::FeatureWeights;
pub use nbest::{DerivationStep, Solution};
pub use search::{SearchStats, StackStats};

use search::Search;

/// Search parameters for one decode call.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Largest jump allowed between the end of one phrase and the start
    /// of the next.
    pub distortion_limit: usize,
    pub n_best: usize,
    /// Hypotheses kept per stack. 0 is treated as 1.
    pub beam_size: usize,
    /// Skip the reachability check; dead ends are possible.
    pub lazy: bool,
    pub recombine: bool,
    /// Log-probability of a word unknown even as a unigram.
    pub lm_floor: f64,
    /// Checked between stacks; when set the decode returns nothing.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        let s = settings();
        Self {
            distortion_limit: s.decoder.distortion_limit,
            n_best: s.decoder.n_best,
            beam_size: s.decoder.beam_size,
            lazy: s.decoder.lazy,
            recombine: s.decoder.recombine,
            lm_floor: s.lm.floor_log_prob,
            cancel: None,
        }
    }
}

impl DecodeOptions {
    /// Smaller beam with lazy reachability.
    pub fn fast() -> Self {
        Self {
            beam_size: settings().decoder.fast_beam_size,
            lazy: true,
            ..Self::default()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Decode one sentence. Deterministic for fixed inputs.
pub fn decode(
    source: &[WordId],
    candidates: &CandidateSet,
    lm: &dyn LanguageModel,
    weights: &FeatureWeights,
    options: &DecodeOptions,
) -> Vec<Solution> {
    decode_with_stats(source, candidates, lm, weights, options).0
}

/// `decode`, also returning per-stack counts.
pub fn decode_with_stats(
    source: &[WordId],
    candidates: &CandidateSet,
    lm: &dyn LanguageModel,
    weights: &FeatureWeights,
    options: &DecodeOptions,
) -> (Vec<Solution>, SearchStats) {
    let mut search = Search::new(source, candidates, lm, weights, options);
    let solutions = search.run();
    (solutions, search.stats)
}
