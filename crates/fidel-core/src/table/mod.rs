//! Phrase-table access.
//!
//! `PhraseTable` is the only view the decoder has of translation options:
//! given the words of a sentence, return every entry whose foreign side is
//! a contiguous run of those words. `MemoryPhraseTable` is the in-process
//! implementation, loaded from Moses text format or its compiled form.

mod memory;

pub use memory::MemoryPhraseTable;

use serde::{Deserialize, Serialize};

/// Feature names of a standard Moses phrase table, in column order.
pub const DEFAULT_FEATURE_NAMES: [&str; 5] = [
    "phi(t|f)",
    "lex(t|f)",
    "phi(f|t)",
    "lex(f|t)",
    "phrasePenalty",
];

/// A named log-domain score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub score: f64,
}

impl Feature {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// One phrase-table row matched against a sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseTableEntry {
    /// Foreign (source) side, words joined by single spaces.
    pub foreign: String,
    /// Translation (target) side, words joined by single spaces.
    pub translation: String,
    pub features: Vec<Feature>,
}

impl PhraseTableEntry {
    /// Sum of all feature scores, used to rank entries before search.
    pub fn approx_score(&self) -> f64 {
        self.features.iter().map(|f| f.score).sum()
    }
}

pub trait PhraseTable: Send + Sync {
    fn foreign_language(&self) -> &str;
    fn translation_language(&self) -> &str;
    fn feature_names(&self) -> &[String];

    /// Every entry whose foreign side equals some contiguous run of
    /// `terms`. Order is unspecified.
    fn lookup(&self, terms: &[&str]) -> Vec<PhraseTableEntry>;
}
