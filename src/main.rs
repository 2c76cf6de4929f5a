use anyhow::Result;
use clap::Parser;
use mathgpt_pipeline::cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mathgpt_pipeline=info")),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
