//! Feature layout of the log-linear model and its weight vector.

use tracing::warn;

use crate::weights::Weights;

pub const UNKNOWN_WORD: usize = 0;
pub const LINEAR_DISTORTION: usize = 1;
pub const LM: usize = 2;
pub const PHRASE_PENALTY: usize = 3;
/// Index of the first translation-model feature.
pub const TM_OFFSET: usize = 4;

pub const CORE_FEATURE_NAMES: [&str; TM_OFFSET] =
    ["UnknownWord", "LinearDistortion", "LM", "PhrasePenalty"];

/// Prefix used to tell table features apart from the core ones.
pub const TM_PREFIX: &str = "TM:";

/// Display names for every feature slot, table features prefixed.
pub fn feature_names(tm_names: &[String]) -> Vec<String> {
    CORE_FEATURE_NAMES
        .iter()
        .map(|s| s.to_string())
        .chain(tm_names.iter().map(|n| format!("{TM_PREFIX}{n}")))
        .collect()
}

/// Weights indexed by feature slot.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureWeights {
    values: Box<[f64]>,
}

impl FeatureWeights {
    pub fn new(unknown_word: f64, distortion: f64, lm: f64, phrase_penalty: f64, tm: &[f64]) -> Self {
        let mut values = vec![unknown_word, distortion, lm, phrase_penalty];
        values.extend_from_slice(tm);
        Self {
            values: values.into_boxed_slice(),
        }
    }

    /// Look up each slot by name. Table features try the bare name, then
    /// the `TM:` form. Missing or non-finite weights are 0.0, except
    /// `UnknownWord` which falls back to `unknown_default`.
    pub fn resolve(weights: &Weights, tm_names: &[String], unknown_default: f64) -> Self {
        let lookup = |key: &str| {
            weights.get(key).filter(|w| {
                let ok = w.is_finite();
                if !ok {
                    warn!(key, "ignoring non-finite weight");
                }
                ok
            })
        };
        let tm: Vec<f64> = tm_names
            .iter()
            .map(|name| {
                lookup(name)
                    .or_else(|| lookup(&format!("{TM_PREFIX}{name}")))
                    .unwrap_or(0.0)
            })
            .collect();
        Self::new(
            lookup(CORE_FEATURE_NAMES[UNKNOWN_WORD]).unwrap_or(unknown_default),
            lookup(CORE_FEATURE_NAMES[LINEAR_DISTORTION]).unwrap_or(0.0),
            lookup(CORE_FEATURE_NAMES[LM]).unwrap_or(0.0),
            lookup(CORE_FEATURE_NAMES[PHRASE_PENALTY]).unwrap_or(0.0),
            &tm,
        )
    }

    /// Number of feature slots.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, slot: usize) -> f64 {
        self.values.get(slot).copied().unwrap_or(0.0)
    }

    pub fn unknown_word(&self) -> f64 {
        self.values[UNKNOWN_WORD]
    }

    pub fn distortion(&self) -> f64 {
        self.values[LINEAR_DISTORTION]
    }

    pub fn lm(&self) -> f64 {
        self.values[LM]
    }

    pub fn phrase_penalty(&self) -> f64 {
        self.values[PHRASE_PENALTY]
    }

    pub fn tm(&self) -> &[f64] {
        &self.values[TM_OFFSET..]
    }

    /// Weighted sum of a candidate's table features. Features without a
    /// weight slot contribute nothing.
    pub fn tm_dot(&self, features: &[f64]) -> f64 {
        self.tm().iter().zip(features).map(|(w, f)| w * f).sum()
    }
}
