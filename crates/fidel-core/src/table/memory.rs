use std::collections::HashMap;
use std::fs;
use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::model_io::{has_magic, map_file, open_text, read_frame, write_frame, ModelError};

use super::{Feature, PhraseTable, PhraseTableEntry};

const MAGIC: &[u8; 4] = b"FDPT";
const VERSION: u8 = 1;

/// A translation option as stored: target text and log-domain scores
/// aligned with the table's feature names.
type StoredEntry = (String, Vec<f64>);

#[derive(Serialize, Deserialize)]
struct TableData {
    foreign_language: String,
    translation_language: String,
    feature_names: Vec<String>,
    entries: Vec<(String, Vec<StoredEntry>)>,
}

/// Hash-map phrase table held entirely in memory.
#[derive(Debug)]
pub struct MemoryPhraseTable {
    foreign_language: String,
    translation_language: String,
    feature_names: Vec<String>,
    entries: HashMap<String, Vec<StoredEntry>>,
    /// Longest foreign side in words; bounds the spans tried by `lookup`.
    max_foreign_len: usize,
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl MemoryPhraseTable {
    pub fn new(
        foreign_language: impl Into<String>,
        translation_language: impl Into<String>,
        feature_names: Vec<String>,
    ) -> Self {
        Self {
            foreign_language: foreign_language.into(),
            translation_language: translation_language.into(),
            feature_names,
            entries: HashMap::new(),
            max_foreign_len: 0,
        }
    }

    /// Add a row. `scores` are log-domain and must line up with
    /// `feature_names()`; a short vector is padded with zeros.
    pub fn insert(&mut self, foreign: &str, translation: &str, mut scores: Vec<f64>) {
        let foreign = normalize(foreign);
        let words = foreign.split(' ').filter(|w| !w.is_empty()).count();
        if words == 0 {
            return;
        }
        scores.resize(self.feature_names.len(), 0.0);
        self.max_foreign_len = self.max_foreign_len.max(words);
        self.entries
            .entry(foreign)
            .or_default()
            .push((normalize(translation), scores));
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse Moses text format: `foreign ||| translation ||| p1 p2 ...`.
    ///
    /// Scores are probabilities and are stored as `log10(p)`. Fields after
    /// the third (alignments, counts) are ignored.
    pub fn from_moses(
        reader: impl BufRead,
        foreign_language: &str,
        translation_language: &str,
        feature_names: Vec<String>,
    ) -> Result<Self, ModelError> {
        let _span = debug_span!("phrase_table_from_moses").entered();
        let mut table = Self::new(foreign_language, translation_language, feature_names);
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split("|||").map(str::trim).collect();
            if fields.len() < 3 {
                return Err(ModelError::parse(
                    line_no,
                    format!("expected at least 3 '|||' fields, found {}", fields.len()),
                ));
            }
            let scores = parse_scores(fields[2], table.feature_names.len(), line_no)?;
            table.insert(fields[0], fields[1], scores);
        }
        debug!(rows = table.len(), max_foreign_len = table.max_foreign_len);
        Ok(table)
    }

    /// Load a Moses text table from disk (`.gz` allowed).
    pub fn load_moses(
        path: &Path,
        foreign_language: &str,
        translation_language: &str,
        feature_names: Vec<String>,
    ) -> Result<Self, ModelError> {
        let reader = open_text(path)?;
        Self::from_moses(reader, foreign_language, translation_language, feature_names)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        let mut entries: Vec<(String, Vec<StoredEntry>)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let data = TableData {
            foreign_language: self.foreign_language.clone(),
            translation_language: self.translation_language.clone(),
            feature_names: self.feature_names.clone(),
            entries,
        };
        let payload = bincode::serialize(&data).map_err(ModelError::Serialize)?;
        write_frame(MAGIC, VERSION, &payload)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ModelError> {
        let payload = read_frame(data, MAGIC, VERSION)?;
        let data: TableData = bincode::deserialize(payload).map_err(ModelError::Deserialize)?;
        let max_foreign_len = data
            .entries
            .iter()
            .map(|(k, _)| k.split(' ').count())
            .max()
            .unwrap_or(0);
        Ok(Self {
            foreign_language: data.foreign_language,
            translation_language: data.translation_language,
            feature_names: data.feature_names,
            entries: data.entries.into_iter().collect(),
            max_foreign_len,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self, ModelError> {
        let mmap = map_file(path)?;
        Self::from_bytes(&mmap)
    }

    /// Open a compiled table, or parse a Moses text table when the file
    /// does not carry the compiled magic. The languages and feature names
    /// only apply to text input.
    pub fn load(
        path: &Path,
        foreign_language: &str,
        translation_language: &str,
        feature_names: Vec<String>,
    ) -> Result<Self, ModelError> {
        if has_magic(path, MAGIC)? {
            Self::open(path)
        } else {
            Self::load_moses(path, foreign_language, translation_language, feature_names)
        }
    }
}

fn parse_scores(field: &str, expected: usize, line_no: usize) -> Result<Vec<f64>, ModelError> {
    let mut scores = Vec::with_capacity(expected);
    for tok in field.split_whitespace() {
        let p: f64 = tok
            .parse()
            .map_err(|_| ModelError::parse(line_no, format!("invalid score '{tok}'")))?;
        if !(p > 0.0 && p.is_finite()) {
            return Err(ModelError::parse(
                line_no,
                format!("score {tok} is not a positive probability"),
            ));
        }
        scores.push(p.log10());
    }
    if scores.len() != expected {
        return Err(ModelError::parse(
            line_no,
            format!("expected {expected} scores, found {}", scores.len()),
        ));
    }
    Ok(scores)
}

impl PhraseTable for MemoryPhraseTable {
    fn foreign_language(&self) -> &str {
        &self.foreign_language
    }

    fn translation_language(&self) -> &str {
        &self.translation_language
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn lookup(&self, terms: &[&str]) -> Vec<PhraseTableEntry> {
        let mut result = Vec::new();
        for i in 0..terms.len() {
            let max_end = terms.len().min(i + self.max_foreign_len);
            for j in i + 1..=max_end {
                let query = terms[i..j].join(" ");
                let Some(rows) = self.entries.get(&query) else {
                    continue;
                };
                for (translation, scores) in rows {
                    result.push(PhraseTableEntry {
                        foreign: query.clone(),
                        translation: translation.clone(),
                        features: self
                            .feature_names
                            .iter()
                            .zip(scores)
                            .map(|(name, &score)| Feature::new(name.clone(), score))
                            .collect(),
                    });
                }
            }
        }
        debug!(terms = terms.len(), matches = result.len(), "phrase table lookup");
        result
    }
}
