//! Text-level entry point: terms in, labelled translations out.
//!
//! `Translator` bundles the long-lived models (language model, target
//! vocabulary shared with it, source vocabulary, weights) and turns each
//! call into one `decode` over a freshly built candidate set. It is
//! `Send + Sync`; sentences may be translated from several threads at once.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug_span;

use crate::candidates::CandidateSet;
use crate::decoder::explain::{self, ExplainInput, ExplainResult};
use crate::decoder::features::{feature_names, FeatureWeights};
use crate::decoder::{decode, DecodeOptions, Solution};
use crate::lm::LanguageModel;
use crate::phrase::{Token, WordId};
use crate::settings::settings;
use crate::table::{Feature, PhraseTable};
use crate::vocab::Vocabulary;
use crate::weights::Weights;

/// Text tagged with its language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub text: String,
    pub language: String,
}

impl Label {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
    pub source: Label,
    pub target: Label,
    pub score: f64,
    /// Weighted contribution of every feature, core features first.
    pub features: Vec<Feature>,
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:.6} from {}]",
            self.target.text, self.score, self.source.text
        )
    }
}

/// Everything one sentence needs before search.
struct Prepared {
    source: Vec<WordId>,
    candidates: CandidateSet,
    weights: FeatureWeights,
    feature_names: Vec<String>,
}

pub struct Translator {
    lm: Arc<dyn LanguageModel>,
    target_vocab: Arc<Vocabulary>,
    source_vocab: Vocabulary,
    weights: Weights,
    options: DecodeOptions,
    candidate_margin: usize,
    unknown_word_default: f64,
}

impl Translator {
    /// `target_vocab` must be the vocabulary `lm` was loaded with, so that
    /// target ids mean the same word on both sides.
    pub fn new(lm: Arc<dyn LanguageModel>, target_vocab: Arc<Vocabulary>, weights: Weights) -> Self {
        let s = settings();
        Self {
            lm,
            target_vocab,
            source_vocab: Vocabulary::new(),
            weights,
            options: DecodeOptions::default(),
            candidate_margin: s.decoder.candidate_margin,
            unknown_word_default: s.weights.unknown_word_default,
        }
    }

    /// Replace the default decode options used by `translate`.
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn source_vocab(&self) -> &Vocabulary {
        &self.source_vocab
    }

    pub fn target_vocab(&self) -> &Vocabulary {
        &self.target_vocab
    }

    /// Translate with the default beam.
    pub fn translate(&self, terms: &[&str], table: &dyn PhraseTable, n_best: usize) -> Vec<Translation> {
        let options = DecodeOptions {
            n_best,
            ..self.options.clone()
        };
        self.translate_with(terms, table, &options)
    }

    /// Translate with the fast beam and lazy reachability.
    pub fn translate_fast(&self, terms: &[&str], table: &dyn PhraseTable, n_best: usize) -> Vec<Translation> {
        let options = DecodeOptions {
            n_best,
            beam_size: settings().decoder.fast_beam_size,
            lazy: true,
            ..self.options.clone()
        };
        self.translate_with(terms, table, &options)
    }

    /// Translate under explicit options. An empty result means no
    /// translation was found.
    pub fn translate_with(
        &self,
        terms: &[&str],
        table: &dyn PhraseTable,
        options: &DecodeOptions,
    ) -> Vec<Translation> {
        let _span = debug_span!("translate", terms = terms.len()).entered();
        let prepared = self.prepare(terms, table, options);
        let solutions = decode(
            &prepared.source,
            &prepared.candidates,
            self.lm.as_ref(),
            &prepared.weights,
            options,
        );
        let source = Label::new(terms.join(" "), table.foreign_language());
        solutions
            .iter()
            .map(|s| self.to_translation(s, &source, table, &prepared.feature_names))
            .collect()
    }

    /// Decode one sentence and report candidates, stack statistics and
    /// the n-best with their feature breakdown.
    pub fn explain(&self, terms: &[&str], table: &dyn PhraseTable, options: &DecodeOptions) -> ExplainResult {
        let prepared = self.prepare(terms, table, options);
        let input = ExplainInput {
            terms,
            source: &prepared.source,
            candidates: &prepared.candidates,
            lm: self.lm.as_ref(),
            weights: &prepared.weights,
            feature_names: &prepared.feature_names,
            options,
        };
        explain::explain(&input, |t| self.render(t))
    }

    fn prepare(&self, terms: &[&str], table: &dyn PhraseTable, options: &DecodeOptions) -> Prepared {
        let source = self.source_vocab.intern_all(terms);
        let tm_names = table.feature_names();
        let max_per_span = options.beam_size.max(1) + self.candidate_margin;
        let candidates = CandidateSet::build(
            table.lookup(terms),
            tm_names,
            max_per_span,
            &self.source_vocab,
            &self.target_vocab,
        );
        Prepared {
            source,
            candidates,
            weights: FeatureWeights::resolve(&self.weights, tm_names, self.unknown_word_default),
            feature_names: feature_names(tm_names),
        }
    }

    fn render(&self, token: Token) -> String {
        let word = match token {
            Token::Target(id) => self.target_vocab.word(id),
            Token::PassThrough(id) => self.source_vocab.word(id),
        };
        word.unwrap_or_default()
    }

    fn to_translation(
        &self,
        solution: &Solution,
        source: &Label,
        table: &dyn PhraseTable,
        names: &[String],
    ) -> Translation {
        let text = solution
            .tokens
            .iter()
            .map(|&t| self.render(t))
            .collect::<Vec<_>>()
            .join(" ");
        Translation {
            source: source.clone(),
            target: Label::new(text, table.translation_language()),
            score: solution.score,
            features: names
                .iter()
                .zip(&solution.features)
                .map(|(name, &score)| Feature::new(name.clone(), score))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::{NgramModel, NgramScore};
    use crate::table::MemoryPhraseTable;

    fn table() -> MemoryPhraseTable {
        let mut t = MemoryPhraseTable::new("fr", "en", vec!["p".to_string()]);
        t.insert("la maison", "the house", vec![1.0]);
        t.insert("la", "the", vec![-0.2]);
        t.insert("maison", "house", vec![-0.3]);
        t.insert("maison", "home", vec![-0.9]);
        t.insert("bleue", "blue", vec![-0.1]);
        t
    }

    fn translator(weights: Weights) -> Translator {
        let vocab = Arc::new(Vocabulary::new());
        Translator::new(Arc::new(NgramModel::new(1)), vocab, weights)
    }

    #[test]
    fn whole_phrase_wins() {
        let tr = translator(Weights::from_pairs([("p", 1.0)]));
        let result = tr.translate(&["la", "maison"], &table(), 1);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].target, Label::new("the house", "en"));
        assert_eq!(result[0].source, Label::new("la maison", "fr"));
        assert_eq!(result[0].score, 1.0);
        assert_eq!(result[0].to_string(), "the house [1.000000 from la maison]");
    }

    #[test]
    fn prefixed_weight_name_is_accepted() {
        let tr = translator(Weights::from_pairs([("TM:p", 2.0)]));
        let result = tr.translate(&["la", "maison"], &table(), 1);
        assert_eq!(result[0].score, 2.0);
    }

    #[test]
    fn unknown_word_is_copied() {
        // A distortion cost keeps the source order; without it "zzz house"
        // ties and wins on token order.
        let tr = translator(Weights::from_pairs([
            ("UnknownWord", -5.0),
            ("p", 1.0),
            ("LinearDistortion", -0.1),
        ]));
        let result = tr.translate(&["maison", "zzz"], &table(), 2);
        assert_eq!(result[0].target.text, "house zzz");
        assert!((result[0].score - -5.3).abs() < 1e-12);
        assert_eq!(result[0].features[0], Feature::new("UnknownWord", -5.0));
        assert_eq!(result[1].target.text, "zzz house");
        assert!((result[1].score - -5.6).abs() < 1e-12);
    }

    #[test]
    fn unknown_word_weight_defaults_to_settings() {
        let tr = translator(Weights::new());
        let result = tr.translate(&["zzz"], &table(), 1);
        assert_eq!(result[0].score, settings().weights.unknown_word_default);
    }

    #[test]
    fn features_are_named_and_sum_to_score() {
        let tr = translator(Weights::from_pairs([("p", 1.0), ("PhrasePenalty", -0.5)]));
        let result = tr.translate(&["la", "maison", "bleue"], &table(), 3);
        assert!(!result.is_empty());
        let names: Vec<&str> = result[0].features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["UnknownWord", "LinearDistortion", "LM", "PhrasePenalty", "TM:p"]);
        for t in &result {
            let total: f64 = t.features.iter().map(|f| f.score).sum();
            assert!((total - t.score).abs() < 1e-9);
        }
    }

    #[test]
    fn language_model_breaks_ties() {
        let vocab = Arc::new(Vocabulary::new());
        let mut lm = NgramModel::new(1);
        lm.insert(&[vocab.intern("home")], NgramScore::new(-0.1));
        lm.insert(&[vocab.intern("house")], NgramScore::new(-3.0));
        let weights = Weights::from_pairs([("LM", 1.0)]);
        let tr = Translator::new(Arc::new(lm), vocab, weights);
        let result = tr.translate(&["maison"], &table(), 2);
        assert_eq!(result[0].target.text, "home");
        assert_eq!(result[1].target.text, "house");
    }

    #[test]
    fn fast_and_default_agree_on_easy_input() {
        let tr = translator(Weights::from_pairs([("p", 1.0)]));
        let a = tr.translate(&["la", "maison"], &table(), 1);
        let b = tr.translate_fast(&["la", "maison"], &table(), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn explain_renders_words() {
        let tr = translator(Weights::from_pairs([("p", 1.0)]));
        let options = DecodeOptions {
            n_best: 2,
            ..DecodeOptions::default()
        };
        let report = tr.explain(&["la", "maison"], &table(), &options);
        assert_eq!(report.solutions[0].text, "the house");
        assert!(report.spans.iter().any(|s| s.source == "la maison"));
    }

    #[test]
    fn empty_sentence_translates_to_nothing() {
        let tr = translator(Weights::new());
        assert!(tr.translate(&[], &table(), 1).is_empty());
    }
}
