use std::path::Path;

use fidel_core::lm::{LanguageModel, NgramModel};
use fidel_core::table::{MemoryPhraseTable, PhraseTable};
use fidel_core::vocab::Vocabulary;

use super::models::feature_names;

/// Moses text table to the compiled form.
pub fn compile_table(input: &str, output: &str, from: &str, to: &str, features: Option<&[String]>) {
    let table = die!(
        MemoryPhraseTable::load_moses(Path::new(input), from, to, feature_names(features)),
        "Error reading {input}: {}"
    );
    die!(table.save(Path::new(output)), "Error writing {output}: {}");
    println!(
        "OK: {} rows, {} features -> {output}",
        table.len(),
        table.feature_names().len()
    );
}

/// ARPA text model to the compiled form.
pub fn compile_lm(input: &str, output: &str) {
    let vocab = Vocabulary::new();
    let lm = die!(
        NgramModel::load_arpa(Path::new(input), &vocab),
        "Error reading {input}: {}"
    );
    die!(lm.save(Path::new(output), &vocab), "Error writing {output}: {}");
    println!(
        "OK: order {}, {} n-grams, {} words -> {output}",
        lm.order(),
        lm.len(),
        vocab.len()
    );
}
