use std::fs;

pub fn settings_export() {
    print!("{}", fidel_core::settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(
        fidel_core::settings::parse_settings_toml(&content),
        "Error: {}"
    );
    println!(
        "OK: decoder.beam_size={}, decoder.distortion_limit={}, lm.floor_log_prob={}",
        s.decoder.beam_size, s.decoder.distortion_limit, s.lm.floor_log_prob
    );
}

/// Install a custom settings file before anything reads the defaults.
pub fn install_settings(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    die!(
        fidel_core::settings::init_custom(content),
        "Error in settings {file}: {}"
    );
}
