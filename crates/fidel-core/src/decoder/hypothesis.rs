//! Partial derivations and the per-sentence arena that owns them.

use std::cmp::Ordering;
use std::ops::Range;

use crate::phrase::{Token, WordId};

use super::coverage::Coverage;

/// Index of a hypothesis in its `Arena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HypId(u32);

impl HypId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An immutable search state. Successors are new values; nothing here is
/// updated after insertion into the arena.
#[derive(Debug, Clone)]
pub struct Hypothesis {
    pub coverage: Coverage,
    /// Number of covered positions (cached `coverage.count()`).
    pub covered: usize,
    /// One past the last source position translated; 0 for the root.
    pub last_end: usize,
    /// Source span of the phrase applied last; `None` for the root.
    pub span: Option<Range<usize>>,
    /// Tokens emitted by the last phrase.
    pub phrase: Box<[Token]>,
    /// Tokens emitted along the whole chain.
    pub output_len: usize,
    /// Trailing LM context, at most `order - 1` ids.
    pub lm_state: Box<[WordId]>,
    pub score: f64,
    pub future_cost: f64,
    /// Weighted contribution of each feature slot, summed along the chain.
    pub features: Box<[f64]>,
    pub parent: Option<HypId>,
}

#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<Hypothesis>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hyp: Hypothesis) -> HypId {
        let id = HypId(self.nodes.len() as u32);
        self.nodes.push(hyp);
        id
    }

    pub fn get(&self, id: HypId) -> &Hypothesis {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HypId, &Hypothesis)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, h)| (HypId(i as u32), h))
    }

    /// Chain from the root to `id`, root first.
    pub fn chain(&self, id: HypId) -> Vec<HypId> {
        let mut ids = vec![id];
        let mut cur = id;
        while let Some(parent) = self.get(cur).parent {
            ids.push(parent);
            cur = parent;
        }
        ids.reverse();
        ids
    }

    /// Every token emitted from the root to `id`.
    pub fn output(&self, id: HypId) -> Vec<Token> {
        let mut out = Vec::with_capacity(self.get(id).output_len);
        for step in self.chain(id) {
            out.extend_from_slice(&self.get(step).phrase);
        }
        out
    }

    /// Total order used for ranking: score descending, then covered
    /// positions descending, then output length descending, then the
    /// emitted tokens in lexicographic order. Equal derivations fall back
    /// to creation order.
    pub fn compare(&self, a: HypId, b: HypId) -> Ordering {
        let (x, y) = (self.get(a), self.get(b));
        y.score
            .total_cmp(&x.score)
            .then(y.covered.cmp(&x.covered))
            .then(y.output_len.cmp(&x.output_len))
            .then_with(|| self.output(a).cmp(&self.output(b)))
            .then(a.cmp(&b))
    }

    /// Pruning order: future cost descending, then `compare`.
    pub fn rank(&self, a: HypId, b: HypId) -> Ordering {
        self.get(b)
            .future_cost
            .total_cmp(&self.get(a).future_cost)
            .then_with(|| self.compare(a, b))
    }
}
