use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::phrase::Token;

use super::hypothesis::{Arena, HypId};

/// One phrase application in a derivation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivationStep {
    pub source: Range<usize>,
    pub target: Vec<Token>,
    /// Coverage after this step, `x` covered and `.` free.
    pub coverage: String,
}

/// A complete translation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub tokens: Vec<Token>,
    pub score: f64,
    pub future_cost: f64,
    /// Weighted contribution per feature slot (see `features::feature_names`).
    pub features: Vec<f64>,
    pub steps: Vec<DerivationStep>,
}

impl Solution {
    fn from_chain(arena: &Arena, id: HypId) -> Self {
        let hyp = arena.get(id);
        let mut tokens = Vec::with_capacity(hyp.output_len);
        let mut steps = Vec::new();
        for step_id in arena.chain(id) {
            let step = arena.get(step_id);
            let Some(span) = step.span.clone() else {
                continue;
            };
            tokens.extend_from_slice(&step.phrase);
            steps.push(DerivationStep {
                source: span,
                target: step.phrase.to_vec(),
                coverage: step.coverage.to_string(),
            });
        }
        Self {
            tokens,
            score: hyp.score,
            future_cost: hyp.future_cost,
            features: hyp.features.to_vec(),
            steps,
        }
    }
}

/// Best `n` hypotheses of the terminal stack by the ranking total order.
/// Distinct derivations of the same output are all kept.
pub(crate) fn extract(arena: &Arena, terminal: &[HypId], n: usize) -> Vec<Solution> {
    let mut ids = terminal.to_vec();
    ids.sort_by(|&a, &b| arena.compare(a, b));
    ids.truncate(n);

    let results: Vec<Solution> = ids
        .into_iter()
        .map(|id| Solution::from_chain(arena, id))
        .collect();
    debug!(
        terminal = terminal.len(),
        result_count = results.len(),
        best_score = results.first().map(|s| s.score)
    );
    results
}
