use clap::{Args, Parser, Subcommand};

use fidel_cli::commands::decode_ops::{self, DecodeArgs};
use fidel_cli::commands::{compile_ops, config_ops, explain_ops};
use fidel_cli::trace_init::init_tracing;

#[derive(Parser)]
#[command(name = "fidel", about = "Phrase-based machine translation decoder")]
struct Cli {
    /// Log decoder stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Custom settings TOML (see `fidel settings export`)
    #[arg(long, global = true)]
    settings: Option<String>,
    #[command(subcommand)]
    command: Command,
}

/// Model files and search parameters shared by `decode` and `explain`.
#[derive(Args)]
struct ModelOpts {
    /// Phrase table (Moses text, .gz, or compiled)
    #[arg(short = 'p', long)]
    phrase_table: String,
    /// Language model (ARPA text, .gz, or compiled)
    #[arg(short = 'l', long)]
    lm: String,
    /// Weight file (key = value)
    #[arg(short = 'w', long)]
    weights: String,
    /// Feature names of a text phrase table, in column order
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    features: Option<Vec<String>>,
    /// Source language label
    #[arg(short = 'f', long = "from", default_value = "fr")]
    from: String,
    /// Target language label
    #[arg(short = 't', long = "to", default_value = "en")]
    to: String,
    /// Number of translations per sentence
    #[arg(short = 'n', long, default_value = "1")]
    n_best: usize,
    /// Hypotheses kept per stack (default from settings)
    #[arg(short = 'b', long)]
    beam_size: Option<usize>,
    /// Fast mode: smaller beam, lazy reachability
    #[arg(short = 'z', long)]
    fast: bool,
    /// Maximum reordering jump (default from settings)
    #[arg(long)]
    distortion_limit: Option<usize>,
}

impl ModelOpts {
    fn into_args(self, show_scores: bool, threads: usize) -> DecodeArgs {
        DecodeArgs {
            phrase_table: self.phrase_table,
            lm: self.lm,
            weights: self.weights,
            features: self.features,
            from: self.from,
            to: self.to,
            n_best: self.n_best,
            beam_size: self.beam_size,
            distortion_limit: self.distortion_limit,
            fast: self.fast,
            show_scores,
            threads,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Translate stdin, one whitespace-tokenized sentence per line
    Decode {
        #[command(flatten)]
        models: ModelOpts,
        /// Print scores and the source sentence
        #[arg(short = 's', long)]
        scores: bool,
        /// Worker threads (1 translates line by line as input arrives)
        #[arg(long, default_value = "1")]
        threads: usize,
    },
    /// Compile a Moses text phrase table
    CompileTable {
        /// Input text file (.gz allowed)
        input: String,
        /// Output binary file
        output: String,
        /// Feature names, in column order
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        features: Option<Vec<String>>,
        /// Source language label
        #[arg(short = 'f', long = "from", default_value = "fr")]
        from: String,
        /// Target language label
        #[arg(short = 't', long = "to", default_value = "en")]
        to: String,
    },
    /// Compile an ARPA language model
    CompileLm {
        /// Input ARPA file (.gz allowed)
        input: String,
        /// Output binary file
        output: String,
    },
    /// Explain the search for one sentence
    Explain {
        #[command(flatten)]
        models: ModelOpts,
        /// Sentence to translate (whitespace-tokenized)
        sentence: String,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Export or validate settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the default settings TOML
    Export,
    /// Validate a custom settings TOML file
    Validate {
        /// Path to the TOML file
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();
    if cli.verbose {
        init_tracing();
    }
    if let Some(file) = &cli.settings {
        config_ops::install_settings(file);
    }

    match cli.command {
        Command::Decode {
            models,
            scores,
            threads,
        } => decode_ops::decode_cmd(&models.into_args(scores, threads)),
        Command::CompileTable {
            input,
            output,
            features,
            from,
            to,
        } => compile_ops::compile_table(&input, &output, &from, &to, features.as_deref()),
        Command::CompileLm { input, output } => compile_ops::compile_lm(&input, &output),
        Command::Explain {
            models,
            sentence,
            json,
        } => explain_ops::explain_cmd(&models.into_args(false, 1), &sentence, json),
        Command::Settings { action } => match action {
            SettingsAction::Export => config_ops::settings_export(),
            SettingsAction::Validate { file } => config_ops::settings_validate(&file),
        },
    }
}
