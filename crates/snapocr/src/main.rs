//! snapocr: read text out of screenshots.

mod cli;
mod output;
mod setup;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout carries only results
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    use output::Output;

    let output = Output::new(cli.json);
    let engine = setup::load_engine(cli.models.as_deref(), cli.config.as_deref(), &output).await?;

    match cli.command {
        Commands::Recognize(args) => cli::commands::recognize::run(engine, args, &output).await,
        Commands::Find(args) => cli::commands::find::run(engine, args, &output).await,
    }
}
