//! CLI command definitions using clap.

use clap::{Args, Parser, Subcommand};

pub mod commands;

/// Read text out of screenshots.
#[derive(Parser)]
#[command(name = "snapocr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory with det_model.rten, rec_model.rten and ppocr_keys_v1.txt
    /// (defaults to ../models next to the executable)
    #[arg(long, env = "SNAPOCR_MODELS_DIR", global = true)]
    pub models: Option<String>,

    /// JSON file overriding engine settings
    #[arg(long, env = "SNAPOCR_CONFIG", global = true)]
    pub config: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print all text lines found in one or more images
    Recognize(RecognizeArgs),

    /// Find text lines in an image and print their positions
    Find(FindArgs),
}

#[derive(Args)]
pub struct RecognizeArgs {
    /// Image files or glob patterns (e.g. 'shots/*.png')
    #[arg(required = true)]
    pub images: Vec<String>,
}

#[derive(Args)]
pub struct FindArgs {
    /// Image file
    pub image: String,

    /// Text to search for within each line
    pub query: String,

    /// Treat the query as a pattern with * and ? wildcards
    #[arg(long)]
    pub pattern: bool,

    /// Match case exactly
    #[arg(long)]
    pub case_sensitive: bool,
}
