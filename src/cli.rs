use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

/// Per-invocation replacements for configuration values
#[derive(ClapArgs, Debug, Default)]
pub struct Overrides {
    /// Target language for translations
    #[arg(short, long, global = true)]
    pub language: Option<String>,

    /// Ollama model identifier
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Ollama server address
    #[arg(short, long, global = true)]
    pub address: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the comment blocks found in a file, without translating
    Blocks {
        /// Source file
        #[arg(short, long)]
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Translate every comment block in a file
    Annotate {
        /// Source file
        #[arg(short, long)]
        input: PathBuf,

        /// Print JSON instead of the annotated source
        #[arg(long)]
        json: bool,

        /// Print a one-line summary per block instead of the annotated source
        #[arg(long, conflicts_with = "json")]
        summary: bool,

        /// Return immediately if the model is not ready yet instead of waiting
        #[arg(long)]
        no_wait: bool,
    },

    /// Translate a single piece of text, or one comment block of a file
    Translate {
        /// Text to translate
        #[arg(short, long, conflicts_with = "input")]
        text: Option<String>,

        /// Source file containing the comment
        #[arg(short, long, requires = "line")]
        input: Option<PathBuf>,

        /// 1-based line inside the comment block to translate
        #[arg(long)]
        line: Option<usize>,
    },

    /// Report whether the configured model is available
    Status,

    /// Make sure the configured model is present, pulling it if needed
    Pull,

    /// Turn annotations on in the configuration file
    Enable,

    /// Turn annotations off in the configuration file
    Disable,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
