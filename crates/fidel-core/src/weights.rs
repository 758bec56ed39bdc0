//! Feature weights read from a properties-style file.
//!
//! One `key = value` per line (`:` or plain whitespace also separate the
//! key). Lines starting with `#` or `!` are comments. A backslash escapes
//! the next character of a key, so `TM\:phi(t|f) = 0.2` names the feature
//! `TM:phi(t|f)`. Values that do not parse as a finite number are skipped
//! with a warning and the feature falls back to its default.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Weights {
    values: HashMap<String, f64>,
}

impl Weights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut weights = Self::new();
        for (k, v) in pairs {
            weights.set(k, v);
        }
        weights
    }

    pub fn parse(text: &str) -> Self {
        let mut weights = Self::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = split_property(line);
            if key.is_empty() {
                continue;
            }
            match value.parse::<f64>() {
                Ok(v) if v.is_finite() => weights.set(key, v),
                _ => warn!(line = idx + 1, key = %key, value, "ignoring unparseable weight"),
            }
        }
        weights
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

/// Split a property line into its (unescaped) key and raw value.
fn split_property(line: &str) -> (String, &str) {
    let mut key = String::new();
    let mut chars = line.char_indices();
    let mut rest = "";
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    key.push(escaped);
                }
            }
            '=' | ':' => {
                rest = &line[i + 1..];
                break;
            }
            c if c.is_whitespace() => {
                let after = line[i..].trim_start();
                rest = after
                    .strip_prefix('=')
                    .or_else(|| after.strip_prefix(':'))
                    .unwrap_or(after);
                break;
            }
            c => key.push(c),
        }
    }
    (key, rest.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators() {
        let w = Weights::parse("LM=0.5\nLinearDistortion: -0.3\nUnknownWord -50\nPhrasePenalty = 1e-1\n");
        assert_eq!(w.get("LM"), Some(0.5));
        assert_eq!(w.get("LinearDistortion"), Some(-0.3));
        assert_eq!(w.get("UnknownWord"), Some(-50.0));
        assert_eq!(w.get("PhrasePenalty"), Some(0.1));
        assert_eq!(w.len(), 4);
    }

    #[test]
    fn comments_and_blank_lines() {
        let w = Weights::parse("# weights\n\n! also a comment\nLM = 1\n");
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn escaped_key() {
        let w = Weights::parse("TM\\:phi(t|f) = 0.2\n");
        assert_eq!(w.get("TM:phi(t|f)"), Some(0.2));
    }

    #[test]
    fn bad_values_are_skipped() {
        let w = Weights::parse("LM = lots\nUnknownWord = NaN\nLinearDistortion = 2\nempty =\n");
        assert_eq!(w.get("LM"), None);
        assert_eq!(w.get("UnknownWord"), None);
        assert_eq!(w.get("empty"), None);
        assert_eq!(w.get("LinearDistortion"), Some(2.0));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.properties");
        std::fs::write(&path, "LM=0.7\n").unwrap();
        let w = Weights::load(&path).unwrap();
        assert_eq!(w.get("LM"), Some(0.7));
        assert!(Weights::load(&dir.path().join("missing")).is_err());
    }
}
