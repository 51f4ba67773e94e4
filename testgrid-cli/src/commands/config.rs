//! `testgrid config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use testgrid_core::config::TestGridConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Section names accepted by `config show --section`.
const SECTIONS: &[&str] = &[
    "general",
    "storage",
    "coordinator",
    "server",
    "metrics",
    "engines",
];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load and validate the configuration file, reporting any errors.
///
/// # Errors
///
/// Returns `CliError::Config` if the file is missing or invalid.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match TestGridConfig::load(config_path).await {
        Ok(_) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Show the effective configuration (file + env overrides + defaults).
///
/// A missing file shows the defaults.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = TestGridConfig::load_or_default(config_path).await?;
    let source = config_path.display().to_string();

    let report = match section.as_deref() {
        None => ConfigReport::new(source, None, &config),
        Some("general") => ConfigReport::new(source, section, &config.general),
        Some("storage") => ConfigReport::new(source, section, &config.storage),
        Some("coordinator") => ConfigReport::new(source, section, &config.coordinator),
        Some("server") => ConfigReport::new(source, section, &config.server),
        Some("metrics") => ConfigReport::new(source, section, &config.metrics),
        Some("engines") => ConfigReport::new(source, section, &config.engines),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    writer.render(&report)?;
    Ok(())
}

/// Configuration display report.
///
/// Text output shows the TOML form, JSON output embeds the values.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub config: serde_json::Value,
    #[serde(skip)]
    pub config_toml: String,
}

impl ConfigReport {
    fn new<T: Serialize>(source: String, section: Option<String>, value: &T) -> Self {
        Self {
            source,
            section,
            config: serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
            config_toml: toml::to_string_pretty(value)
                .unwrap_or_else(|e| format!("(serialization error: {})", e)),
        }
    }
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    /// Empty when valid
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(report: &impl Render) -> String {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        report.render_text(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf-8")
    }

    #[test]
    fn test_config_report_section_renders_toml() {
        let config = TestGridConfig::default();
        let report = ConfigReport::new(
            "testgrid.toml".to_owned(),
            Some("storage".to_owned()),
            &config.storage,
        );
        let text = render(&report);
        assert!(text.contains("Configuration [storage] (source: testgrid.toml)"));
        assert!(text.contains("backend = \"file\""));
        assert_eq!(report.config["file_name"], "testgrid.json");
    }

    #[test]
    fn test_config_report_full_json_has_every_section() {
        let report = ConfigReport::new("x".to_owned(), None, &TestGridConfig::default());
        for section in SECTIONS {
            assert!(
                report.config.get(*section).is_some(),
                "json config should contain [{section}]"
            );
        }
        let json = serde_json::to_value(&report).expect("json");
        assert!(json.get("config_toml").is_none(), "toml text is text-only");
        assert!(json.get("section").is_none());
    }

    #[test]
    fn test_validation_report_lists_errors() {
        let report = ConfigValidationReport {
            source: "bad.toml".to_owned(),
            valid: false,
            errors: vec!["invalid config value for 'storage.backend'".to_owned()],
        };
        let text = render(&report);
        assert!(text.contains("INVALID"));
        assert!(text.contains("storage.backend"));
    }
}
