use serde::Serialize;

use crate::candidates::CandidateSet;
use crate::lm::LanguageModel;
use crate::phrase::{Span, Token, WordId};
use crate::table::Feature;

use super::{decode_with_stats, DecodeOptions, FeatureWeights, SearchStats, Solution};

/// Full diagnostic result for one sentence.
#[derive(Debug, Serialize)]
pub struct ExplainResult {
    pub source: Vec<String>,
    pub spans: Vec<ExplainSpan>,
    pub stats: SearchStats,
    pub solutions: Vec<ExplainSolution>,
}

/// A source span that has candidates.
#[derive(Debug, Serialize)]
pub struct ExplainSpan {
    pub start: usize,
    pub end: usize,
    pub source: String,
    pub options: Vec<ExplainOption>,
}

#[derive(Debug, Serialize)]
pub struct ExplainOption {
    pub target: String,
    pub approx_score: f64,
    /// Weighted table score, as charged by the search.
    pub weighted: f64,
}

#[derive(Debug, Serialize)]
pub struct ExplainSolution {
    pub text: String,
    pub score: f64,
    pub future_cost: f64,
    pub features: Vec<Feature>,
    pub steps: Vec<ExplainStep>,
}

#[derive(Debug, Serialize)]
pub struct ExplainStep {
    pub start: usize,
    pub end: usize,
    pub source: String,
    pub target: String,
    pub coverage: String,
}

/// Inputs of one explained decode.
pub struct ExplainInput<'a> {
    /// Surface form of each source position.
    pub terms: &'a [&'a str],
    pub source: &'a [WordId],
    pub candidates: &'a CandidateSet,
    pub lm: &'a dyn LanguageModel,
    pub weights: &'a FeatureWeights,
    pub feature_names: &'a [String],
    pub options: &'a DecodeOptions,
}

/// Decode `input` and capture candidates, stack counts and the n-best
/// with their feature breakdown. `render` turns a token into text.
pub fn explain(input: &ExplainInput<'_>, render: impl Fn(Token) -> String) -> ExplainResult {
    let join = |tokens: &[Token]| {
        tokens
            .iter()
            .map(|&t| render(t))
            .collect::<Vec<_>>()
            .join(" ")
    };
    let span_text = |start: usize, end: usize| input.terms[start..end].join(" ");

    let n = input.source.len();
    let max_len = input.candidates.max_source_len();
    let mut spans = Vec::new();
    for start in 0..n {
        for end in start + 1..=n.min(start + max_len) {
            let options = input.candidates.get(&Span::new(input.source, start..end));
            if options.is_empty() {
                continue;
            }
            spans.push(ExplainSpan {
                start,
                end,
                source: span_text(start, end),
                options: options
                    .iter()
                    .map(|c| {
                        let target: Vec<Token> = c.target.iter().map(|&w| Token::Target(w)).collect();
                        ExplainOption {
                            target: join(&target),
                            approx_score: c.approx_score,
                            weighted: input.weights.tm_dot(&c.features),
                        }
                    })
                    .collect(),
            });
        }
    }

    let (solutions, stats) = decode_with_stats(
        input.source,
        input.candidates,
        input.lm,
        input.weights,
        input.options,
    );
    let solutions = solutions
        .iter()
        .map(|s: &Solution| ExplainSolution {
            text: join(&s.tokens),
            score: s.score,
            future_cost: s.future_cost,
            features: input
                .feature_names
                .iter()
                .zip(&s.features)
                .map(|(name, &v)| Feature::new(name.clone(), v))
                .collect(),
            steps: s
                .steps
                .iter()
                .map(|step| ExplainStep {
                    start: step.source.start,
                    end: step.source.end,
                    source: span_text(step.source.start, step.source.end),
                    target: join(&step.target),
                    coverage: step.coverage.clone(),
                })
                .collect(),
        })
        .collect();

    ExplainResult {
        source: input.terms.iter().map(|t| t.to_string()).collect(),
        spans,
        stats,
        solutions,
    }
}

/// Format an ExplainResult as human-readable text.
pub fn format_text(result: &ExplainResult) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== Candidates for \"{}\" ({} words, {} spans) ===\n",
        result.source.join(" "),
        result.source.len(),
        result.spans.len(),
    ));
    for span in &result.spans {
        out.push_str(&format!("  [{},{}) {}\n", span.start, span.end, span.source));
        for opt in &span.options {
            out.push_str(&format!(
                "    -> {:<24} approx={:<10.4} weighted={:.4}\n",
                opt.target, opt.approx_score, opt.weighted,
            ));
        }
    }

    out.push_str(&format!(
        "\n=== Stacks ({} hypotheses, {} unreachable) ===\n",
        result.stats.hypotheses, result.stats.unreachable,
    ));
    for s in &result.stats.stacks {
        out.push_str(&format!(
            "  covered={:<3} generated={:<6} recombined={:<6} kept={:<4} dead_ends={}\n",
            s.covered, s.generated, s.recombined, s.kept, s.dead_ends,
        ));
    }
    if result.stats.cancelled {
        out.push_str("  (cancelled)\n");
    }

    if result.solutions.is_empty() {
        out.push_str("\nNo translation found.\n");
        return out;
    }

    out.push_str(&format!("\n=== Translations ({}) ===\n", result.solutions.len()));
    for (i, sol) in result.solutions.iter().enumerate() {
        out.push_str(&format!(
            "\n  #{:<2} {}  (score={:.6}, future={:.6})\n",
            i + 1,
            sol.text,
            sol.score,
            sol.future_cost,
        ));
        for (j, step) in sol.steps.iter().enumerate() {
            out.push_str(&format!(
                "    step[{}]: {} [{},{}) -> {}  {}\n",
                j, step.coverage, step.start, step.end, step.source, step.target,
            ));
        }
        let features: Vec<String> = sol
            .features
            .iter()
            .filter(|f| f.score != 0.0)
            .map(|f| format!("{}={:.4}", f.name, f.score))
            .collect();
        out.push_str(&format!("    features: {}\n", features.join(" ")));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testutil::{candidates, options, row, NoLm};

    fn render(t: Token) -> String {
        match t {
            Token::Target(id) => format!("t{id}"),
            Token::PassThrough(id) => format!("s{id}"),
        }
    }

    fn run(n_best: usize) -> ExplainResult {
        let source = [1, 2];
        let set = candidates(vec![row(&[1, 2], &[10, 11], &[1.0]), row(&[1], &[12], &[-1.0])]);
        let weights = FeatureWeights::new(-5.0, 0.0, 0.0, 0.0, &[1.0]);
        let names = crate::decoder::features::feature_names(&["p".to_string()]);
        let opts = options(2, n_best, 10, false);
        let input = ExplainInput {
            terms: &["a", "b"],
            source: &source,
            candidates: &set,
            lm: &NoLm,
            weights: &weights,
            feature_names: &names,
            options: &opts,
        };
        explain(&input, render)
    }

    #[test]
    fn explain_lists_spans_and_solutions() {
        let result = run(3);
        assert_eq!(result.source, vec!["a", "b"]);
        assert_eq!(result.spans.len(), 2);
        let best = &result.solutions[0];
        assert_eq!(best.text, "t10 t11");
        assert_eq!(best.steps.len(), 1);
        assert_eq!(best.steps[0].source, "a b");
        assert_eq!(best.steps[0].coverage, "xx");
        assert_eq!(best.features[4].name, "TM:p");
        assert_eq!(best.features[4].score, 1.0);
        assert!(result.solutions.len() >= 2);
        assert_eq!(result.stats.stacks.last().map(|s| s.covered), Some(2));
    }

    #[test]
    fn format_text_mentions_everything() {
        let text = format_text(&run(1));
        assert!(text.contains("=== Candidates for \"a b\""));
        assert!(text.contains("=== Stacks"));
        assert!(text.contains("#1  t10 t11"));
        assert!(text.contains("TM:p=1.0000"));
    }

    #[test]
    fn explain_serializes_to_json() {
        let json = serde_json::to_string(&run(1)).unwrap();
        assert!(json.contains("\"solutions\""));
    }
}
