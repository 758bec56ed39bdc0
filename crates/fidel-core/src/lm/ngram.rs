use std::fs;
use std::io::BufRead;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::model_io::{has_magic, map_file, open_text, read_frame, write_frame, ModelError};
use crate::phrase::WordId;
use crate::vocab::Vocabulary;

use super::{LanguageModel, NgramScore};

const MAGIC: &[u8; 4] = b"FDLM";
const VERSION: u8 = 1;

pub const SENTENCE_START: &str = "<s>";
pub const SENTENCE_END: &str = "</s>";
pub const UNKNOWN_WORD: &str = "<unk>";

#[derive(Serialize, Deserialize)]
struct ModelData {
    order: usize,
    /// words[i] has local id i + 1.
    words: Vec<String>,
    ngrams: Vec<(Vec<WordId>, NgramScore)>,
}

/// Extremes over all stored scores, kept for `log_prob_bounds`.
#[derive(Debug, Clone, Copy)]
struct ScoreRange {
    min_log_prob: f64,
    max_log_prob: f64,
    min_backoff: f64,
    max_backoff: f64,
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self {
            min_log_prob: f64::INFINITY,
            max_log_prob: f64::NEG_INFINITY,
            min_backoff: 0.0,
            max_backoff: 0.0,
        }
    }
}

/// Back-off n-gram model held in a hash map keyed by id sequences.
pub struct NgramModel {
    order: usize,
    ngrams: FxHashMap<Box<[WordId]>, NgramScore>,
    range: ScoreRange,
    sentence_start: Option<WordId>,
    sentence_end: Option<WordId>,
    unknown: Option<WordId>,
}

#[derive(Clone, Copy)]
enum Section {
    Preamble,
    Data,
    Ngrams(usize),
}

impl NgramModel {
    pub fn new(order: usize) -> Self {
        Self {
            order: order.max(1),
            ngrams: FxHashMap::default(),
            range: ScoreRange::default(),
            sentence_start: None,
            sentence_end: None,
            unknown: None,
        }
    }

    /// Add or replace an n-gram. The model order grows to fit.
    pub fn insert(&mut self, ngram: &[WordId], score: NgramScore) {
        if ngram.is_empty() {
            return;
        }
        self.order = self.order.max(ngram.len());
        let r = &mut self.range;
        r.min_log_prob = r.min_log_prob.min(score.log_prob);
        r.max_log_prob = r.max_log_prob.max(score.log_prob);
        if let Some(b) = score.backoff {
            r.min_backoff = r.min_backoff.min(b);
            r.max_backoff = r.max_backoff.max(b);
        }
        self.ngrams.insert(ngram.into(), score);
    }

    /// Resolve `<s>`, `</s>` and `<unk>` against `vocab`. Markers are only
    /// used when the model has a unigram for them.
    pub fn bind_markers(&mut self, vocab: &Vocabulary) {
        let known = |w: &str| vocab.get(w).filter(|&id| self.ngrams.contains_key(&[id][..]));
        self.sentence_start = known(SENTENCE_START);
        self.sentence_end = known(SENTENCE_END);
        self.unknown = known(UNKNOWN_WORD);
    }

    pub fn len(&self) -> usize {
        self.ngrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ngrams.is_empty()
    }

    /// Parse an ARPA file, interning its words into `vocab`.
    ///
    /// Also accepts headerless body lines of the form
    /// `logprob<TAB>w1 w2 ...[<TAB>backoff]`.
    pub fn from_arpa(reader: impl BufRead, vocab: &Vocabulary) -> Result<Self, ModelError> {
        let _span = debug_span!("ngram_from_arpa").entered();
        let mut model = Self::new(1);
        let mut section = Section::Preamble;
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            let t = line.trim();
            if t.is_empty() {
                continue;
            }
            if t == "\\data\\" {
                section = Section::Data;
                continue;
            }
            if t == "\\end\\" {
                break;
            }
            if let Some(n) = parse_section_header(t) {
                section = Section::Ngrams(n);
                continue;
            }
            match section {
                Section::Data => {
                    let declared = parse_count_line(t)
                        .ok_or_else(|| ModelError::parse(line_no, "expected 'ngram N=count'"))?;
                    model.order = model.order.max(declared);
                }
                Section::Preamble if !line.contains('\t') => {
                    // free text before \data\
                }
                Section::Preamble | Section::Ngrams(_) => {
                    let expected = match section {
                        Section::Ngrams(n) => Some(n),
                        _ => None,
                    };
                    let (words, score) = parse_entry(&line, expected, line_no)?;
                    let ids = vocab.intern_all(words);
                    model.insert(&ids, score);
                }
            }
        }
        model.bind_markers(vocab);
        debug!(order = model.order, ngrams = model.len());
        Ok(model)
    }

    pub fn load_arpa(path: &Path, vocab: &Vocabulary) -> Result<Self, ModelError> {
        let reader = open_text(path)?;
        Self::from_arpa(reader, vocab)
    }

    /// Serialize with the words of `vocab`, so the file is self-contained.
    pub fn to_bytes(&self, vocab: &Vocabulary) -> Result<Vec<u8>, ModelError> {
        let mut ngrams: Vec<(Vec<WordId>, NgramScore)> = self
            .ngrams
            .iter()
            .map(|(k, v)| (k.to_vec(), *v))
            .collect();
        ngrams.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));
        let data = ModelData {
            order: self.order,
            words: vocab.snapshot(),
            ngrams,
        };
        let payload = bincode::serialize(&data).map_err(ModelError::Serialize)?;
        write_frame(MAGIC, VERSION, &payload)
    }

    /// Load a compiled model, interning its words into `vocab` (ids are
    /// remapped when `vocab` already holds other words).
    pub fn from_bytes(data: &[u8], vocab: &Vocabulary) -> Result<Self, ModelError> {
        let payload = read_frame(data, MAGIC, VERSION)?;
        let data: ModelData = bincode::deserialize(payload).map_err(ModelError::Deserialize)?;
        let remap: Vec<WordId> = data.words.iter().map(|w| vocab.intern(w)).collect();
        let mut model = Self::new(data.order);
        for (local, score) in data.ngrams {
            let ids: Option<Vec<WordId>> = local
                .iter()
                .map(|&id| (id as usize).checked_sub(1).and_then(|i| remap.get(i).copied()))
                .collect();
            let ids = ids.ok_or_else(|| ModelError::parse(0, "n-gram refers to unknown word id"))?;
            model.insert(&ids, score);
        }
        model.bind_markers(vocab);
        Ok(model)
    }

    pub fn save(&self, path: &Path, vocab: &Vocabulary) -> Result<(), ModelError> {
        fs::write(path, self.to_bytes(vocab)?)?;
        Ok(())
    }

    pub fn open(path: &Path, vocab: &Vocabulary) -> Result<Self, ModelError> {
        let mmap = map_file(path)?;
        Self::from_bytes(&mmap, vocab)
    }

    /// Open a compiled model, or parse ARPA text when the file does not
    /// carry the compiled magic.
    pub fn load(path: &Path, vocab: &Vocabulary) -> Result<Self, ModelError> {
        if has_magic(path, MAGIC)? {
            Self::open(path, vocab)
        } else {
            Self::load_arpa(path, vocab)
        }
    }
}

/// `\3-grams:` → 3
fn parse_section_header(line: &str) -> Option<usize> {
    line.strip_prefix('\\')?
        .strip_suffix("-grams:")?
        .parse()
        .ok()
}

/// `ngram 3=1234` → 3
fn parse_count_line(line: &str) -> Option<usize> {
    let rest = line.strip_prefix("ngram")?.trim();
    let (n, _count) = rest.split_once('=')?;
    n.trim().parse().ok()
}

fn parse_f64(tok: &str, line_no: usize) -> Result<f64, ModelError> {
    tok.trim()
        .parse()
        .map_err(|_| ModelError::parse(line_no, format!("invalid number '{tok}'")))
}

fn parse_entry<'a>(
    line: &'a str,
    expected: Option<usize>,
    line_no: usize,
) -> Result<(Vec<&'a str>, NgramScore), ModelError> {
    let (log_prob, words, backoff) = if line.contains('\t') {
        let fields: Vec<&str> = line.split('\t').collect();
        let log_prob = parse_f64(fields[0], line_no)?;
        let words: Vec<&str> = fields
            .get(1)
            .copied()
            .map(|f| f.split_whitespace().collect())
            .unwrap_or_default();
        let backoff = match fields.get(2).map(|f| f.trim()) {
            Some(f) if !f.is_empty() => Some(parse_f64(f, line_no)?),
            _ => None,
        };
        (log_prob, words, backoff)
    } else {
        let n = expected.ok_or_else(|| ModelError::parse(line_no, "n-gram line outside a section"))?;
        let toks: Vec<&str> = line.split_whitespace().collect();
        if toks.len() != n + 1 && toks.len() != n + 2 {
            return Err(ModelError::parse(
                line_no,
                format!("expected {n} words with a score, found {} fields", toks.len()),
            ));
        }
        let log_prob = parse_f64(toks[0], line_no)?;
        let backoff = match toks.get(n + 1) {
            Some(b) => Some(parse_f64(b, line_no)?),
            None => None,
        };
        (log_prob, toks[1..=n].to_vec(), backoff)
    };
    if words.is_empty() {
        return Err(ModelError::parse(line_no, "n-gram has no words"));
    }
    if let Some(n) = expected {
        if words.len() != n {
            return Err(ModelError::parse(
                line_no,
                format!("expected a {n}-gram, found {} words", words.len()),
            ));
        }
    }
    Ok((words, NgramScore { log_prob, backoff }))
}

impl LanguageModel for NgramModel {
    fn order(&self) -> usize {
        self.order
    }

    fn score(&self, ngram: &[WordId]) -> Option<NgramScore> {
        self.ngrams.get(ngram).copied()
    }

    fn log_prob_bounds(&self, floor: f64) -> (f64, f64) {
        let r = &self.range;
        let hops = (self.order - 1) as f64;
        let lo = r.min_log_prob.min(floor) + hops * r.min_backoff.min(0.0);
        let hi = r.max_log_prob.max(floor) + hops * r.max_backoff.max(0.0);
        (lo, hi)
    }

    fn sentence_start(&self) -> Option<WordId> {
        self.sentence_start
    }

    fn sentence_end(&self) -> Option<WordId> {
        self.sentence_end
    }

    fn unknown_word(&self) -> Option<WordId> {
        self.unknown
    }
}
