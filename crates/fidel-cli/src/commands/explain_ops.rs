use fidel_core::decoder::explain::format_text;

use super::decode_ops::{decode_options, DecodeArgs};
use super::models::{self, ModelPaths};

/// Decode one sentence and dump candidates, stacks and the n-best.
pub fn explain_cmd(args: &DecodeArgs, sentence: &str, json: bool) {
    let models = die!(
        models::load(&ModelPaths {
            phrase_table: &args.phrase_table,
            lm: &args.lm,
            weights: &args.weights,
            from: &args.from,
            to: &args.to,
            features: args.features.as_deref(),
        }),
        "Error loading models: {}"
    );
    let terms: Vec<&str> = sentence.split_whitespace().collect();
    let result = models
        .translator
        .explain(&terms, &models.table, &decode_options(args));

    if json {
        let out = die!(serde_json::to_string_pretty(&result), "Error: {}");
        println!("{out}");
    } else {
        print!("{}", format_text(&result));
    }
}
