//! Fixtures shared by the decoder tests.

use crate::candidates::{Candidate, CandidateSet};
use crate::lm::{LanguageModel, NgramScore};
use crate::phrase::{Phrase, WordId};

use super::DecodeOptions;

/// A model that knows nothing: every word scores the floor.
pub(crate) struct NoLm;

impl LanguageModel for NoLm {
    fn order(&self) -> usize {
        1
    }

    fn score(&self, _ngram: &[WordId]) -> Option<NgramScore> {
        None
    }
}

/// One candidate for `source`.
pub(crate) fn row(source: &[WordId], target: &[WordId], features: &[f64]) -> (Phrase, Candidate) {
    (
        Phrase::from(source.to_vec()),
        Candidate::new(target.to_vec(), features.to_vec()),
    )
}

/// Candidate set with no per-span limit.
pub(crate) fn candidates(rows: Vec<(Phrase, Candidate)>) -> CandidateSet {
    let feature_count = rows.iter().map(|(_, c)| c.features.len()).max().unwrap_or(0);
    let mut set = CandidateSet::new(feature_count, 0);
    for (source, candidate) in rows {
        set.insert(source, candidate);
    }
    set
}

pub(crate) fn options(distortion_limit: usize, n_best: usize, beam_size: usize, lazy: bool) -> DecodeOptions {
    DecodeOptions {
        distortion_limit,
        n_best,
        beam_size,
        lazy,
        recombine: true,
        lm_floor: -99.0,
        cancel: None,
    }
}
