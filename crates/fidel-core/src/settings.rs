//! Global decoder settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`
//!
//! Settings only provide defaults. Every decode call still takes its
//! parameters explicitly through `DecodeOptions`.

use std::sync::OnceLock;

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        // Custom TOML is validated in `init_custom`; the embedded default is
        // validated by build.rs and by the tests below.
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub decoder: DecoderSettings,
    pub lm: LmSettings,
    pub weights: WeightSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecoderSettings {
    pub beam_size: usize,
    pub fast_beam_size: usize,
    pub distortion_limit: usize,
    pub n_best: usize,
    pub lazy: bool,
    #[serde(default = "default_recombine")]
    pub recombine: bool,
    pub candidate_margin: usize,
}

fn default_recombine() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LmSettings {
    pub floor_log_prob: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightSettings {
    pub unknown_word_default: f64,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_positive_usize {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }
    macro_rules! check_finite {
        ($section:ident . $field:ident) => {
            if !s.$section.$field.is_finite() {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be finite".to_string(),
                });
            }
        };
    }

    check_positive_usize!(decoder.beam_size);
    check_positive_usize!(decoder.fast_beam_size);
    check_positive_usize!(decoder.n_best);

    check_finite!(lm.floor_log_prob);
    if s.lm.floor_log_prob >= 0.0 {
        return Err(SettingsError::InvalidValue {
            field: "lm.floor_log_prob".to_string(),
            reason: "must be negative".to_string(),
        });
    }

    check_finite!(weights.unknown_word_default);

    Ok(())
}
