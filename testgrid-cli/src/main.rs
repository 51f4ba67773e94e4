use clap::Parser;
use tracing_subscriber::EnvFilter;

use testgrid_cli::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries command output, logs go to stderr
    let filter = match cli.log_level.as_deref() {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = %cli.config.display(), "testgrid starting");

    if let Err(e) = testgrid_cli::run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
