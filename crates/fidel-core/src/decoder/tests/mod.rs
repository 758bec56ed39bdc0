
use crate::decoder::features::FeatureWeights;
use crate::lm::{NgramModel, NgramScore};

/// Weights with only the table features set (and the unknown-word penalty).
pub(super) fn tm_weights(unknown_word: f64, tm: &[f64]) -> FeatureWeights {
    FeatureWeights::new(unknown_word, 0.0, 0.0, 0.0, tm)
}

/// Bigram model over target ids 10 and 11 that prefers "11 10".
pub(super) fn bigram_lm() -> NgramModel {
    let mut lm = NgramModel::new(2);
    lm.insert(&[10], NgramScore::with_backoff(-1.0, -1.0));
    lm.insert(&[11], NgramScore::with_backoff(-1.0, -1.0));
    lm.insert(&[11, 10], NgramScore::new(-0.1));
    lm
}
