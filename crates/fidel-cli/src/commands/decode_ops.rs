use std::io::{self, BufRead, BufWriter, Write};

use fidel_core::decoder::DecodeOptions;
use fidel_core::translator::Translation;
use fidel_core::worker::translate_batch;

use super::models::{self, ModelPaths};

pub struct DecodeArgs {
    pub phrase_table: String,
    pub lm: String,
    pub weights: String,
    pub features: Option<Vec<String>>,
    pub from: String,
    pub to: String,
    pub n_best: usize,
    pub beam_size: Option<usize>,
    pub distortion_limit: Option<usize>,
    /// Fast beam with lazy reachability.
    pub fast: bool,
    /// Print score and source after each translation.
    pub show_scores: bool,
    pub threads: usize,
}

pub fn decode_options(args: &DecodeArgs) -> DecodeOptions {
    let mut options = if args.fast {
        DecodeOptions::fast()
    } else {
        DecodeOptions::default()
    };
    options.n_best = args.n_best;
    if let Some(beam) = args.beam_size {
        options.beam_size = beam;
    }
    if let Some(limit) = args.distortion_limit {
        options.distortion_limit = limit;
    }
    options
}

pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(String::from).collect()
}

/// One line per translation. A sentence with no translation still gets
/// an empty line so output stays aligned with input.
pub fn write_translations(
    out: &mut impl Write,
    translations: &[Translation],
    show_scores: bool,
) -> io::Result<()> {
    if translations.is_empty() {
        return writeln!(out);
    }
    for t in translations {
        if show_scores {
            writeln!(out, "{t}")?;
        } else {
            writeln!(out, "{}", t.target.text)?;
        }
    }
    Ok(())
}

/// Translate stdin line by line.
pub fn decode_cmd(args: &DecodeArgs) {
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
    let options = decode_options(args);
    let stdin = io::stdin();
    let mut out = BufWriter::new(io::stdout().lock());

    if args.threads <= 1 {
        for line in stdin.lock().lines() {
            let line = die!(line, "Error reading stdin: {}");
            let terms: Vec<&str> = line.split_whitespace().collect();
            let translations = models.translator.translate_with(&terms, &models.table, &options);
            die!(
                write_translations(&mut out, &translations, args.show_scores),
                "Error writing output: {}"
            );
            die!(out.flush(), "Error writing output: {}");
        }
        return;
    }

    let sentences: Vec<Vec<String>> = stdin
        .lock()
        .lines()
        .map(|line| tokenize(&die!(line, "Error reading stdin: {}")))
        .collect();
    let results = die!(
        translate_batch(
            &models.translator,
            &models.table,
            &sentences,
            &options,
            args.threads
        ),
        "Error starting workers: {}"
    );
    for translations in &results {
        die!(
            write_translations(&mut out, translations, args.show_scores),
            "Error writing output: {}"
        );
    }
    die!(out.flush(), "Error writing output: {}");
}

#[cfg(test)]
mod tests {
    use fidel_core::table::Feature;
    use fidel_core::translator::Label;

    use super::*;

    fn args() -> DecodeArgs {
        DecodeArgs {
            phrase_table: String::new(),
            lm: String::new(),
            weights: String::new(),
            features: None,
            from: "fr".into(),
            to: "en".into(),
            n_best: 3,
            beam_size: None,
            distortion_limit: Some(0),
            fast: false,
            show_scores: false,
            threads: 1,
        }
    }

    #[test]
    fn options_apply_overrides() {
        let mut a = args();
        let options = decode_options(&a);
        assert_eq!(options.n_best, 3);
        assert_eq!(options.distortion_limit, 0);
        assert_eq!(options.beam_size, DecodeOptions::default().beam_size);
        assert!(!options.lazy);

        a.fast = true;
        a.beam_size = Some(7);
        let options = decode_options(&a);
        assert!(options.lazy);
        assert_eq!(options.beam_size, 7);
    }

    #[test]
    fn output_lines() {
        let t = Translation {
            source: Label::new("la maison", "fr"),
            target: Label::new("the house", "en"),
            score: -0.25,
            features: vec![Feature::new("LM", -0.25)],
        };
        let mut buf = Vec::new();
        write_translations(&mut buf, &[t.clone()], false).unwrap();
        write_translations(&mut buf, &[], false).unwrap();
        write_translations(&mut buf, &[t], true).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "the house\n\nthe house [-0.250000 from la maison]\n"
        );
    }

    #[test]
    fn tokenize_splits_on_whitespace() {
        assert_eq!(tokenize("  a\tb  c "), ["a", "b", "c"]);
        assert!(tokenize("").is_empty());
    }
}
