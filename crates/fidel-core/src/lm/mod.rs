//! N-gram language model access.
//!
//! The decoder only needs `score(ngram)`; backoff across orders is done
//! here by `conditional_log_prob` so that every model shares the same
//! recursion and the same floor for unseen words.

mod ngram;

pub use ngram::NgramModel;

use serde::{Deserialize, Serialize};

use crate::phrase::WordId;

/// Score of an n-gram present in the model (log10 domain).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NgramScore {
    pub log_prob: f64,
    /// Backoff weight applied when this n-gram is used as a context for a
    /// longer n-gram that is missing.
    pub backoff: Option<f64>,
}

impl NgramScore {
    pub fn new(log_prob: f64) -> Self {
        Self {
            log_prob,
            backoff: None,
        }
    }

    pub fn with_backoff(log_prob: f64, backoff: f64) -> Self {
        Self {
            log_prob,
            backoff: Some(backoff),
        }
    }
}

pub trait LanguageModel: Send + Sync {
    /// Longest n-gram the model knows.
    fn order(&self) -> usize;

    /// Look up an n-gram (oldest word first). `None` if absent.
    fn score(&self, ngram: &[WordId]) -> Option<NgramScore>;

    /// Lowest and highest value `conditional_log_prob` can return for a
    /// single word given `floor`.
    ///
    /// The default assumes a normalised model (log-probabilities never
    /// exceed 0) whose backoff never drops a score below `floor`.
    fn log_prob_bounds(&self, floor: f64) -> (f64, f64) {
        (floor.min(0.0), 0.0)
    }

    /// Id of `<s>`, used as the initial context when present.
    fn sentence_start(&self) -> Option<WordId> {
        None
    }

    /// Id of `</s>`, scored once a translation is complete when present.
    fn sentence_end(&self) -> Option<WordId> {
        None
    }

    /// Id standing in for words the model cannot know (`<unk>`).
    fn unknown_word(&self) -> Option<WordId> {
        None
    }
}

/// Log-probability of the last word of `ngram` given the words before it.
///
/// If the full n-gram is missing, the oldest context word is dropped and
/// the backoff weight of the dropped-to context is added, repeating until
/// a match is found. A word missing even as a unigram scores `floor`.
/// `ngram` longer than the model order is trimmed to the most recent
/// `order` words first.
pub fn conditional_log_prob(lm: &dyn LanguageModel, ngram: &[WordId], floor: f64) -> f64 {
    if ngram.is_empty() {
        return 0.0;
    }
    let order = lm.order().max(1);
    let mut slice = &ngram[ngram.len().saturating_sub(order)..];
    let mut backoff = 0.0;
    loop {
        if let Some(s) = lm.score(slice) {
            return backoff + s.log_prob;
        }
        if slice.len() == 1 {
            return backoff + floor;
        }
        let context = &slice[..slice.len() - 1];
        if let Some(bow) = lm.score(context).and_then(|s| s.backoff) {
            backoff += bow;
        }
        slice = &slice[1..];
    }
}
