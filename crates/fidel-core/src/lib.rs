//! Phrase-based statistical machine translation decoder.
//!
//! Source sentences are segmented into phrases, reordered within a
//! distortion limit and translated by stack-organised beam search under a
//! log-linear model (translation features, n-gram language model, linear
//! distortion, phrase and unknown-word penalties).

pub mod candidates;
pub mod decoder;
pub mod lm;
pub(crate) mod model_io;
pub mod phrase;
pub mod settings;
pub mod table;
pub mod translator;
pub mod vocab;
pub mod weights;
pub mod worker;

pub use model_io::ModelError;
