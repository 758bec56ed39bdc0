//! Stack decoding over coverage cardinality.
//!
//! Stack `k` holds hypotheses covering `k` source positions. Stacks are
//! visited in increasing order; when stack `k` is reached every hypothesis
//! that can land in it has been generated, so it is recombined, pruned to
//! the beam and then expanded into stacks `k + 1 ..= n`.

use std::ops::Range;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{debug, debug_span};

use crate::candidates::CandidateSet;
use crate::lm::{conditional_log_prob, LanguageModel};
use crate::phrase::{Span, Token, WordId};

use super::coverage::Coverage;
use super::features::{self, FeatureWeights};
use super::future_cost::FutureCost;
use super::hypothesis::{Arena, HypId, Hypothesis};
use super::nbest::{self, Solution};
use super::DecodeOptions;

/// Counts for one stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StackStats {
    pub covered: usize,
    /// Hypotheses that arrived in the stack.
    pub generated: usize,
    /// Dropped because an equivalent, better hypothesis existed.
    pub recombined: usize,
    /// Left after beam pruning.
    pub kept: usize,
    /// Kept hypotheses that had no legal successor.
    pub dead_ends: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    pub stacks: Vec<StackStats>,
    pub hypotheses: usize,
    /// Successors refused by the reachability check.
    pub unreachable: usize,
    pub cancelled: bool,
}

type RecombinationKey<'a> = (&'a Coverage, usize, &'a [WordId]);

pub(crate) struct Search<'a> {
    source: &'a [WordId],
    candidates: &'a CandidateSet,
    lm: &'a dyn LanguageModel,
    weights: &'a FeatureWeights,
    options: &'a DecodeOptions,
    future: FutureCost,
    max_span: usize,
    lm_order: usize,
    sentence_end: Option<WordId>,
    /// LM id charged for pass-through tokens.
    unknown_lm_id: WordId,
    pub(crate) arena: Arena,
    pub(crate) stacks: Vec<Vec<HypId>>,
    pub(crate) stats: SearchStats,
}

impl<'a> Search<'a> {
    pub fn new(
        source: &'a [WordId],
        candidates: &'a CandidateSet,
        lm: &'a dyn LanguageModel,
        weights: &'a FeatureWeights,
        options: &'a DecodeOptions,
    ) -> Self {
        let sentence_end = lm.sentence_end();
        let future = FutureCost::new(
            source,
            candidates,
            weights,
            lm.log_prob_bounds(options.lm_floor),
            sentence_end.is_some(),
            options.distortion_limit,
        );
        Self {
            source,
            candidates,
            lm,
            weights,
            options,
            future,
            max_span: candidates.max_source_len().max(1),
            lm_order: lm.order().max(1),
            sentence_end,
            unknown_lm_id: lm.unknown_word().unwrap_or(0),
            arena: Arena::new(),
            stacks: vec![Vec::new(); source.len() + 1],
            stats: SearchStats::default(),
        }
    }

    /// Run to completion and return the n-best list (empty when cancelled
    /// or when no hypothesis covers the whole sentence).
    pub fn run(&mut self) -> Vec<Solution> {
        let n = self.source.len();
        let _span = debug_span!("search", n, beam = self.options.beam_size).entered();
        if n == 0 || self.options.n_best == 0 {
            return Vec::new();
        }

        let root = self.root();
        let root = self.arena.push(root);
        self.stacks[0].push(root);

        for k in 0..n {
            if self.options.is_cancelled() {
                debug!(stack = k, "search cancelled");
                self.stats.cancelled = true;
                return Vec::new();
            }
            if self.stacks[k].is_empty() {
                continue;
            }
            let mut stack_stats = self.prune(k);
            let ids = self.stacks[k].clone();
            for id in ids {
                let successors = self.successors(id);
                if successors.is_empty() {
                    stack_stats.dead_ends += 1;
                }
                for hyp in successors {
                    let covered = hyp.covered;
                    let succ = self.arena.push(hyp);
                    self.stacks[covered].push(succ);
                }
            }
            self.stats.stacks.push(stack_stats);
        }

        let terminal = &self.stacks[n];
        self.stats.stacks.push(StackStats {
            covered: n,
            generated: terminal.len(),
            recombined: 0,
            kept: terminal.len(),
            dead_ends: 0,
        });
        self.stats.hypotheses = self.arena.len();
        nbest::extract(&self.arena, terminal, self.options.n_best)
    }

    fn root(&self) -> Hypothesis {
        let coverage = Coverage::new(self.source.len());
        let future_cost = self.future.estimate(&coverage);
        Hypothesis {
            coverage,
            covered: 0,
            last_end: 0,
            span: None,
            phrase: Box::new([]),
            output_len: 0,
            lm_state: self.lm.sentence_start().into_iter().collect(),
            score: 0.0,
            future_cost,
            features: vec![0.0; self.weights.len()].into_boxed_slice(),
            parent: None,
        }
    }

    /// Recombine, then keep the best `beam_size` of stack `k`.
    fn prune(&mut self, k: usize) -> StackStats {
        let mut ids = std::mem::take(&mut self.stacks[k]);
        let generated = ids.len();
        if self.options.recombine {
            ids = self.recombine(ids);
        }
        let recombined = generated - ids.len();
        let arena = &self.arena;
        ids.sort_by(|&a, &b| arena.rank(a, b));
        ids.truncate(self.options.beam_size.max(1));
        debug!(stack = k, generated, recombined, kept = ids.len(), "pruned");
        let stats = StackStats {
            covered: k,
            generated,
            recombined,
            kept: ids.len(),
            dead_ends: 0,
        };
        self.stacks[k] = ids;
        stats
    }

    /// Keep one hypothesis per (coverage, position, LM context), the best
    /// by `Arena::compare`. Survivors keep their relative order.
    fn recombine(&self, ids: Vec<HypId>) -> Vec<HypId> {
        let arena = &self.arena;
        let key = |id: HypId| recombination_key(arena, id);
        let mut best: FxHashMap<RecombinationKey<'_>, HypId> = FxHashMap::default();
        for &id in &ids {
            best.entry(key(id))
                .and_modify(|kept| {
                    if arena.compare(id, *kept).is_lt() {
                        *kept = id;
                    }
                })
                .or_insert(id);
        }
        ids.into_iter()
            .filter(|&id| best.get(&key(id)) == Some(&id))
            .collect()
    }

    fn successors(&mut self, id: HypId) -> Vec<Hypothesis> {
        let n = self.source.len();
        let limit = self.options.distortion_limit;
        let hyp = self.arena.get(id);
        let first = hyp.last_end.saturating_sub(limit);
        let last = (hyp.last_end + limit).min(n - 1);

        let mut out = Vec::new();
        let mut unreachable = 0usize;
        for start in first..=last {
            if hyp.coverage.is_covered(start) {
                continue;
            }
            for end in start + 1..=n.min(start + self.max_span) {
                if hyp.coverage.is_covered(end - 1) {
                    break;
                }
                let range = start..end;
                let options = self.candidates.get(&Span::new(self.source, range.clone()));
                if options.is_empty() {
                    if end - start == 1 {
                        let phrase = Box::new([Token::PassThrough(self.source[start])]);
                        match self.extend(id, hyp, range, phrase, None) {
                            Some(s) => out.push(s),
                            None => unreachable += 1,
                        }
                    }
                    continue;
                }
                for c in options {
                    let phrase: Box<[Token]> = c.target.iter().map(|&w| Token::Target(w)).collect();
                    match self.extend(id, hyp, range.clone(), phrase, Some(&c.features)) {
                        Some(s) => out.push(s),
                        None => unreachable += 1,
                    }
                }
            }
        }
        self.stats.unreachable += unreachable;
        out
    }

    /// Apply one phrase to `hyp`. `tm` is `None` for a pass-through.
    /// Returns `None` when the reachability check rejects the result.
    fn extend(
        &self,
        parent: HypId,
        hyp: &Hypothesis,
        range: Range<usize>,
        phrase: Box<[Token]>,
        tm: Option<&[f64]>,
    ) -> Option<Hypothesis> {
        let coverage = hyp.coverage.with(range.clone());
        if !self.options.lazy && !reachable(&coverage, range.end, self.options.distortion_limit) {
            return None;
        }
        let covered = hyp.covered + range.len();
        let complete = covered == self.source.len();
        let w = self.weights;

        let mut features = hyp.features.clone();
        let mut delta = 0.0;
        let mut add = |slot: usize, value: f64| {
            features[slot] += value;
            delta += value;
        };

        match tm {
            Some(scores) => {
                for (k, (weight, score)) in w.tm().iter().zip(scores).enumerate() {
                    add(features::TM_OFFSET + k, weight * score);
                }
            }
            None => add(features::UNKNOWN_WORD, w.unknown_word()),
        }
        let distortion = range.start.abs_diff(hyp.last_end) as f64;
        add(features::LINEAR_DISTORTION, w.distortion() * distortion);
        add(features::PHRASE_PENALTY, w.phrase_penalty());
        let (log_prob, lm_state) = self.score_lm(&hyp.lm_state, &phrase, complete);
        add(features::LM, w.lm() * log_prob);

        let score = hyp.score + delta;
        let future_cost = score + self.future.estimate(&coverage);
        Some(Hypothesis {
            coverage,
            covered,
            last_end: range.end,
            span: Some(range),
            output_len: hyp.output_len + phrase.len(),
            phrase,
            lm_state,
            score,
            future_cost,
            features,
            parent: Some(parent),
        })
    }

    /// LM log-probability of `phrase` after `state`, plus `</s>` when the
    /// sentence is complete. Returns the new trailing context.
    fn score_lm(&self, state: &[WordId], phrase: &[Token], complete: bool) -> (f64, Box<[WordId]>) {
        let order = self.lm_order;
        let floor = self.options.lm_floor;
        let mut buf: Vec<WordId> = Vec::with_capacity(state.len() + phrase.len() + 1);
        buf.extend_from_slice(state);
        let mut log_prob = 0.0;
        for &tok in phrase {
            buf.push(match tok {
                Token::Target(id) => id,
                Token::PassThrough(_) => self.unknown_lm_id,
            });
            let from = buf.len().saturating_sub(order);
            log_prob += conditional_log_prob(self.lm, &buf[from..], floor);
        }
        let keep = buf.len().saturating_sub(order - 1);
        let next_state: Box<[WordId]> = buf[keep..].into();
        if complete {
            if let Some(eos) = self.sentence_end {
                buf.push(eos);
                let from = buf.len().saturating_sub(order);
                log_prob += conditional_log_prob(self.lm, &buf[from..], floor);
            }
        }
        (log_prob, next_state)
    }
}

fn recombination_key(arena: &Arena, id: HypId) -> RecombinationKey<'_> {
    let h = arena.get(id);
    (&h.coverage, h.last_end, &h.lm_state[..])
}

/// Whether the free positions of `coverage` can all still be translated
/// from `pos` without any jump exceeding `limit`.
///
/// A multi-word phrase covers the same words as its single words taken left
/// to right with no jump, and single words are always translatable (by a
/// candidate or a pass-through). So it is enough to search word orders:
/// the left-to-right sweep first, then every order, remembering states
/// that cannot finish.
pub(crate) fn reachable(coverage: &Coverage, pos: usize, limit: usize) -> bool {
    sweep(coverage, pos, limit) || completes(coverage, pos, limit, &mut FxHashSet::default())
}

/// Left to right, one word at a time.
fn sweep(coverage: &Coverage, mut pos: usize, limit: usize) -> bool {
    for u in coverage.uncovered() {
        if u.abs_diff(pos) > limit {
            return false;
        }
        pos = u + 1;
    }
    true
}

fn completes(
    coverage: &Coverage,
    pos: usize,
    limit: usize,
    dead: &mut FxHashSet<(Coverage, usize)>,
) -> bool {
    if sweep(coverage, pos, limit) {
        return true;
    }
    if dead.contains(&(coverage.clone(), pos)) {
        return false;
    }
    let first = pos.saturating_sub(limit);
    let next: Vec<usize> = coverage
        .uncovered()
        .skip_while(|&u| u < first)
        .take_while(|&u| u <= pos + limit)
        .collect();
    for u in next {
        if completes(&coverage.with(u..u + 1), u + 1, limit, dead) {
            return true;
        }
    }
    dead.insert((coverage.clone(), pos));
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachable_sweeps_gaps_left_to_right() {
        // x x . x .  from position 4
        let cov = Coverage::new(5).with(0..2).with(3..4);
        assert!(reachable(&cov, 4, 2));
        assert!(!reachable(&cov, 4, 1));
        // .xx  from 3: back to 0 is a jump of 3
        let cov = Coverage::new(3).with(1..3);
        assert!(!reachable(&cov, 3, 2));
        assert!(reachable(&cov, 3, 3));
        assert!(reachable(&Coverage::new(3).with(0..3), 3, 0));
    }

    #[test]
    fn reachable_walks_backwards() {
        // ..x  from 3 with limit 2: 1 (jump 2), then 0 (jump 2).
        let cov = Coverage::new(3).with(2..3);
        assert!(reachable(&cov, 3, 2));
        // .x..x  from 5 with limit 2: 3, 2, then 0 is a jump of 3 from 3;
        // going 2 first then 3 leaves 0 four away. No order works.
        let cov = Coverage::new(5).with(1..2).with(4..5);
        assert!(!reachable(&cov, 5, 2));
        assert!(reachable(&cov, 5, 3));
        // ....x  from 5 with limit 2: 3, 2, 1, 0, each a jump of 2.
        let cov = Coverage::new(5).with(4..5);
        assert!(reachable(&cov, 5, 2));
    }
}
