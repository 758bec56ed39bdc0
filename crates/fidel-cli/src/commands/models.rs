//! Loading the three model files every decoding command needs.

use std::io;
use std::path::Path;
use std::sync::Arc;

use fidel_core::lm::NgramModel;
use fidel_core::table::{MemoryPhraseTable, DEFAULT_FEATURE_NAMES};
use fidel_core::translator::Translator;
use fidel_core::vocab::Vocabulary;
use fidel_core::weights::Weights;
use fidel_core::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("phrase table {path}: {source}")]
    Table { path: String, source: ModelError },
    #[error("language model {path}: {source}")]
    Lm { path: String, source: ModelError },
    #[error("weights {path}: {source}")]
    Weights { path: String, source: io::Error },
}

pub struct ModelPaths<'a> {
    pub phrase_table: &'a str,
    pub lm: &'a str,
    pub weights: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    /// Feature names for a text table; the standard Moses five if `None`.
    pub features: Option<&'a [String]>,
}

pub struct Models {
    pub translator: Translator,
    pub table: MemoryPhraseTable,
}

pub fn feature_names(features: Option<&[String]>) -> Vec<String> {
    match features {
        Some(names) => names.to_vec(),
        None => DEFAULT_FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Load the table, language model and weights. Each file may be text or
/// compiled.
pub fn load(paths: &ModelPaths<'_>) -> Result<Models, LoadError> {
    let table = MemoryPhraseTable::load(
        Path::new(paths.phrase_table),
        paths.from,
        paths.to,
        feature_names(paths.features),
    )
    .map_err(|source| LoadError::Table {
        path: paths.phrase_table.to_string(),
        source,
    })?;

    let vocab = Arc::new(Vocabulary::new());
    let lm = NgramModel::load(Path::new(paths.lm), &vocab).map_err(|source| LoadError::Lm {
        path: paths.lm.to_string(),
        source,
    })?;

    let weights = Weights::load(Path::new(paths.weights)).map_err(|source| LoadError::Weights {
        path: paths.weights.to_string(),
        source,
    })?;

    Ok(Models {
        translator: Translator::new(Arc::new(lm), vocab, weights),
        table,
    })
}
