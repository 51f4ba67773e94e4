//! TestGrid CLI library
//!
//! Argument parsing, command handlers and output rendering for the `testgrid` binary.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Dispatch the parsed command line to its handler.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::CreateProduct(args) => {
            commands::create_product::execute(args, &cli.config, &writer).await
        }
        Commands::Plan(args) => commands::plan::execute(args, &cli.config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}
