use clap::Parser;
use ipfs_ios_backup::cli::{run, Cli};
use std::process::exit;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{e}");
        exit(1);
    }
}
