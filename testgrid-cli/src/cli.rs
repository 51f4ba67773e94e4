//! CLI argument parsing using clap derive API
//!
//! Purely declarative, no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// TestGrid -- test plan lifecycle for product releases.
///
/// Use `testgrid <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "testgrid", version, about, long_about = None)]
pub struct Cli {
    /// Path to the testgrid.toml configuration file.
    #[arg(long, default_value = "testgrid.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a product (idempotent on name, version and channel).
    CreateProduct(ProductArgs),

    /// Create or inspect test plans.
    Plan(PlanArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- create-product ----

/// Product identity shared by `create-product` and `plan create`.
#[derive(Args, Debug)]
pub struct ProductArgs {
    /// Product name.
    #[arg(short = 'p', long = "product")]
    pub product: String,

    /// Product version.
    #[arg(short = 'v', long = "version")]
    pub product_version: String,

    /// Release channel (LTS, PREMIUM, RELEASED, PREVIEW).
    #[arg(short = 'c', long = "channel", default_value = "LTS")]
    pub channel: String,
}

// ---- plan ----

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(subcommand)]
    pub action: PlanAction,
}

#[derive(Subcommand, Debug)]
pub enum PlanAction {
    /// Register the product and create a new test plan from a definition file.
    Create {
        #[command(flatten)]
        product: ProductArgs,

        /// Test plan definition file (TOML with [[scenario]] entries).
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show a test plan with its scenarios and derived status.
    Show {
        /// Test plan id.
        plan_id: String,
    },
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file.
    Validate,

    /// Show the effective configuration (file + environment overrides).
    Show {
        /// Show only a specific section (general, storage, coordinator, server, metrics, engines).
        #[arg(long)]
        section: Option<String>,
    },
}
