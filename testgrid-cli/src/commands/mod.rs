//! Command handlers -- one module per subcommand

pub mod config;
pub mod create_product;
pub mod plan;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use testgrid_core::config::TestGridConfig;
use testgrid_core::{FileRepository, MemoryRepository};

use crate::error::CliError;

/// Repository selected by `[storage] backend`.
pub enum Store {
    Memory(Arc<MemoryRepository>),
    File(Arc<FileRepository>),
}

impl Store {
    /// Open the configured storage backend.
    pub async fn open(config: &TestGridConfig) -> Result<Self, CliError> {
        match config.storage.backend.as_str() {
            "memory" => {
                warn!("memory storage backend selected, registrations will not outlive this command");
                Ok(Self::Memory(Arc::new(MemoryRepository::new())))
            }
            "file" => {
                let path = config.storage_path();
                debug!(path = %path.display(), "opening file storage");
                let repo = FileRepository::open(&path)
                    .await
                    .map_err(|e| CliError::Persistence(e.to_string()))?;
                Ok(Self::File(Arc::new(repo)))
            }
            other => Err(CliError::Config(format!(
                "unsupported storage backend: {other}"
            ))),
        }
    }
}

/// Load the configuration for commands that touch storage.
///
/// The file is optional; defaults and environment overrides apply without it.
pub async fn load_config(config_path: &Path) -> Result<TestGridConfig, CliError> {
    Ok(TestGridConfig::load_or_default(config_path).await?)
}
