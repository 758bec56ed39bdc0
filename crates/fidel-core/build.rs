const SETTINGS_PATH: &str = "src/default_settings.toml";
const SECTIONS: [&str; 3] = ["decoder", "lm", "weights"];

fn main() {
    println!("cargo:rerun-if-changed={SETTINGS_PATH}");
    let content = include_str!("src/default_settings.toml");
    let value: toml::Value = match content.parse() {
        Ok(v) => v,
        Err(e) => panic!("{SETTINGS_PATH} contains invalid TOML: {e}"),
    };
    for section in SECTIONS {
        if !value.get(section).is_some_and(toml::Value::is_table) {
            panic!("{SETTINGS_PATH} is missing the [{section}] table");
        }
    }
}
