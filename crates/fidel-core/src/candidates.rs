//! Per-sentence translation options, grouped by source span.
//!
//! Built once per sentence from phrase-table matches. Each span keeps at
//! most `max_per_span` candidates, ranked by their approximate score (the
//! plain sum of their log-domain features), so the branching factor of the
//! search stays bounded.

use rustc_hash::FxHashMap;
use tracing::{debug, debug_span};

use crate::phrase::{Phrase, Span, WordId};
use crate::table::PhraseTableEntry;
use crate::vocab::Vocabulary;

/// One way of translating a source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub target: Box<[WordId]>,
    /// Log-domain translation-model scores, one per table feature.
    pub features: Box<[f64]>,
    pub approx_score: f64,
}

impl Candidate {
    /// A candidate ranked by the sum of `features`.
    pub fn new(target: impl Into<Box<[WordId]>>, features: impl Into<Box<[f64]>>) -> Self {
        let features = features.into();
        let approx_score = features.iter().sum();
        Self::with_approx_score(target, features, approx_score)
    }

    pub fn with_approx_score(
        target: impl Into<Box<[WordId]>>,
        features: impl Into<Box<[f64]>>,
        approx_score: f64,
    ) -> Self {
        Self {
            target: target.into(),
            features: features.into(),
            approx_score,
        }
    }

    /// Every score is a real number, so weighting cannot produce NaN.
    fn is_finite(&self) -> bool {
        self.approx_score.is_finite() && self.features.iter().all(|f| f.is_finite())
    }
}

/// Scores of `entry` in `names` order. Features sharing a name are summed;
/// names the entry lacks score 0.
fn features_by_name(entry: &PhraseTableEntry, names: &[String]) -> Vec<f64> {
    names
        .iter()
        .map(|name| {
            entry
                .features
                .iter()
                .filter(|f| &f.name == name)
                .map(|f| f.score)
                .sum::<f64>()
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CandidateSet {
    by_span: FxHashMap<Phrase, Vec<Candidate>>,
    feature_count: usize,
    /// 0 keeps every candidate.
    max_per_span: usize,
    max_source_len: usize,
}

impl CandidateSet {
    pub fn new(feature_count: usize, max_per_span: usize) -> Self {
        Self {
            by_span: FxHashMap::default(),
            feature_count,
            max_per_span,
            max_source_len: 0,
        }
    }

    /// Group phrase-table matches by source span, interning both sides.
    ///
    /// Each entry's features are matched to `feature_names` by name, and
    /// the entry is ranked by the sum of all its raw scores. Entries with
    /// an infinite or NaN score are dropped.
    pub fn build(
        entries: impl IntoIterator<Item = PhraseTableEntry>,
        feature_names: &[String],
        max_per_span: usize,
        source_vocab: &Vocabulary,
        target_vocab: &Vocabulary,
    ) -> Self {
        let _span = debug_span!("candidate_set_build", max_per_span).entered();
        let mut set = Self::new(feature_names.len(), max_per_span);
        let mut matches = 0usize;
        let mut kept = 0usize;
        for entry in entries {
            matches += 1;
            let source = source_vocab.intern_all(entry.foreign.split_whitespace());
            if source.is_empty() {
                continue;
            }
            let target = target_vocab.intern_all(entry.translation.split_whitespace());
            let features = features_by_name(&entry, feature_names);
            let candidate = Candidate::with_approx_score(target, features, entry.approx_score());
            if set.insert(Phrase::from(source), candidate) {
                kept += 1;
            }
        }
        debug!(matches, kept, spans = set.len(), "candidate set built");
        set
    }

    /// Offer a candidate for `source`. Returns `false` when the span is
    /// already full and `candidate` is not strictly better than the worst
    /// one kept, or when any of its scores is not finite.
    pub fn insert(&mut self, source: Phrase, candidate: Candidate) -> bool {
        if source.is_empty() || !candidate.is_finite() {
            return false;
        }
        let source_len = source.len();
        let list = self.by_span.entry(source).or_default();
        let pos = list.partition_point(|c| c.approx_score >= candidate.approx_score);
        if self.max_per_span > 0 && pos >= self.max_per_span {
            return false;
        }
        list.insert(pos, candidate);
        if self.max_per_span > 0 && list.len() > self.max_per_span {
            list.pop();
        }
        self.max_source_len = self.max_source_len.max(source_len);
        true
    }

    /// Candidates for the words under `span`, best approximate score first.
    pub fn get(&self, span: &Span<'_>) -> &[Candidate] {
        self.by_span
            .get(span.ids())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Phrase, &[Candidate])> {
        self.by_span.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Number of distinct source spans.
    pub fn len(&self) -> usize {
        self.by_span.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_span.is_empty()
    }

    pub fn candidate_count(&self) -> usize {
        self.by_span.values().map(Vec::len).sum()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Longest source side held, in words.
    pub fn max_source_len(&self) -> usize {
        self.max_source_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Feature;

    fn entry(foreign: &str, translation: &str, scores: &[f64]) -> PhraseTableEntry {
        PhraseTableEntry {
            foreign: foreign.into(),
            translation: translation.into(),
            features: scores
                .iter()
                .enumerate()
                .map(|(i, &s)| Feature::new(format!("f{i}"), s))
                .collect(),
        }
    }

    fn cand(target: WordId, score: f64) -> Candidate {
        Candidate::new(vec![target], vec![score])
    }

    #[test]
    fn keeps_best_k_per_span() {
        let mut set = CandidateSet::new(1, 2);
        let key = Phrase::from(vec![1]);
        assert!(set.insert(key.clone(), cand(10, -3.0)));
        assert!(set.insert(key.clone(), cand(11, -1.0)));
        assert!(set.insert(key.clone(), cand(12, -2.0)));
        let sentence = [1];
        let got: Vec<WordId> = set
            .get(&Span::new(&sentence, 0..1))
            .iter()
            .map(|c| c.target[0])
            .collect();
        assert_eq!(got, vec![11, 12]);
    }

    #[test]
    fn tie_with_worst_is_dropped() {
        let mut set = CandidateSet::new(1, 2);
        let key = Phrase::from(vec![1]);
        set.insert(key.clone(), cand(10, -1.0));
        set.insert(key.clone(), cand(11, -2.0));
        assert!(!set.insert(key.clone(), cand(12, -2.0)));
        assert!(set.insert(key.clone(), cand(13, -1.5)));
        let sentence = [1];
        let got: Vec<WordId> = set
            .get(&Span::new(&sentence, 0..1))
            .iter()
            .map(|c| c.target[0])
            .collect();
        assert_eq!(got, vec![10, 13]);
    }

    #[test]
    fn zero_limit_keeps_everything() {
        let mut set = CandidateSet::new(1, 0);
        for i in 0..20u32 {
            set.insert(Phrase::from(vec![7]), cand(i, i as f64));
        }
        assert_eq!(set.candidate_count(), 20);
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn build_interns_and_groups_by_span() {
        let source = Vocabulary::new();
        let target = Vocabulary::new();
        let ids = source.intern_all(["das", "haus"]);
        let set = CandidateSet::build(
            vec![
                entry("das", "the", &[-0.1, -0.2]),
                entry("das haus", "the house", &[-0.3]),
                entry("haus", "house", &[-0.1, -0.1, -9.0]),
            ],
            &names(&["f0", "f1"]),
            10,
            &source,
            &target,
        );
        assert_eq!(set.len(), 3);
        assert_eq!(set.max_source_len(), 2);
        let both = set.get(&Span::new(&ids, 0..2));
        assert_eq!(both.len(), 1);
        assert_eq!(&*both[0].features, &[-0.3, 0.0]);
        let haus = set.get(&Span::new(&ids, 1..2));
        assert_eq!(&*haus[0].features, &[-0.1, -0.1]);
        assert!((haus[0].approx_score - -9.2).abs() < 1e-12);
        assert_eq!(target.word(haus[0].target[0]).as_deref(), Some("house"));
    }

    #[test]
    fn features_are_matched_by_name() {
        let source = Vocabulary::new();
        let target = Vocabulary::new();
        let ids = source.intern_all(["chat"]);
        let shuffled = PhraseTableEntry {
            foreign: "chat".into(),
            translation: "cat".into(),
            features: vec![
                Feature::new("lex(t|f)", -2.0),
                Feature::new("extra", -1.0),
                Feature::new("phi(t|f)", -0.1),
                Feature::new("lex(t|f)", -0.5),
            ],
        };
        let set = CandidateSet::build(
            vec![shuffled],
            &names(&["phi(t|f)", "lex(t|f)", "phi(f|t)"]),
            10,
            &source,
            &target,
        );
        let cat = &set.get(&Span::new(&ids, 0..1))[0];
        assert_eq!(&*cat.features, &[-0.1, -2.5, 0.0]);
        assert!((cat.approx_score - -3.6).abs() < 1e-12);
    }

    #[test]
    fn top_k_ranks_by_every_raw_feature() {
        let source = Vocabulary::new();
        let target = Vocabulary::new();
        let ids = source.intern_all(["chat"]);
        // "cat" looks better on the named feature alone but carries a
        // heavy unnamed one.
        let set = CandidateSet::build(
            vec![entry("chat", "cat", &[-0.1, -5.0]), entry("chat", "tomcat", &[-0.5])],
            &names(&["f0"]),
            1,
            &source,
            &target,
        );
        let kept = set.get(&Span::new(&ids, 0..1));
        assert_eq!(kept.len(), 1);
        assert_eq!(target.word(kept[0].target[0]).as_deref(), Some("tomcat"));
    }

    #[test]
    fn non_finite_scores_are_dropped() {
        let source = Vocabulary::new();
        let target = Vocabulary::new();
        let ids = source.intern_all(["chat"]);
        let set = CandidateSet::build(
            vec![
                entry("chat", "cat", &[f64::NEG_INFINITY]),
                entry("chat", "kitty", &[f64::NAN]),
                entry("chat", "puss", &[-1.0]),
            ],
            &names(&["f0"]),
            10,
            &source,
            &target,
        );
        let kept = set.get(&Span::new(&ids, 0..1));
        assert_eq!(kept.len(), 1);
        assert_eq!(target.word(kept[0].target[0]).as_deref(), Some("puss"));

        let mut set = CandidateSet::new(2, 0);
        let infinite = Candidate::new(vec![10u32], vec![0.0, f64::INFINITY]);
        assert!(!set.insert(Phrase::from(vec![1]), infinite));
        assert!(set.is_empty());
    }

    #[test]
    fn missing_span_is_empty() {
        let set = CandidateSet::new(1, 5);
        let sentence = [3, 4];
        assert!(set.get(&Span::new(&sentence, 0..2)).is_empty());
        assert!(set.is_empty());
    }
}
