//! `testgrid create-product` command handler

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use testgrid_core::{Product, Registration, RegistrationService, Repository};

use crate::cli::ProductArgs;
use crate::commands::{Store, load_config};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `create-product` command.
pub async fn execute(
    args: ProductArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let registration = match Store::open(&config).await? {
        Store::Memory(repo) => register(repo, &args).await?,
        Store::File(repo) => register(repo, &args).await?,
    };

    let report = ProductReport::from(&registration);
    info!(
        product_id = %report.id,
        created = report.created,
        "create-product finished"
    );
    writer.render(&report)?;
    Ok(())
}

/// Register the product against any repository.
pub async fn register<R: Repository>(
    repo: Arc<R>,
    args: &ProductArgs,
) -> Result<Registration, CliError> {
    let service = RegistrationService::new(repo);
    Ok(service
        .register(&args.product, &args.product_version, &args.channel)
        .await?)
}

/// Registration result.
#[derive(Debug, Serialize)]
pub struct ProductReport {
    pub id: String,
    pub name: String,
    pub version: String,
    pub channel: String,
    /// `false` when the product already existed
    pub created: bool,
}

impl From<&Product> for ProductReport {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            version: p.version.clone(),
            channel: p.channel.to_string(),
            created: false,
        }
    }
}

impl From<&Registration> for ProductReport {
    fn from(r: &Registration) -> Self {
        Self {
            created: r.is_created(),
            ..Self::from(r.product())
        }
    }
}

impl Render for ProductReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let state = if self.created {
            "registered".green().bold()
        } else {
            "already registered".yellow().bold()
        };
        writeln!(
            w,
            "Product {} {} ({}) {}",
            self.name.bold(),
            self.version,
            self.channel,
            state
        )?;
        writeln!(w, "  Id: {}", self.id)?;
        Ok(())
    }
}
