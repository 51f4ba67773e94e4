//! CLI argument definitions for testgrid-daemon.

use std::path::PathBuf;

use clap::Parser;

/// TestGrid daemon.
///
/// Serves the query API, runs test plans on the configured engines
/// and accepts engine completion reports.
#[derive(Parser, Debug)]
#[command(name = "testgrid-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to testgrid.toml configuration file.
    #[arg(short, long, default_value = "/etc/testgrid/testgrid.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides to the loaded general section.
    pub fn apply_overrides(&self, general: &mut testgrid_core::config::GeneralConfig) {
        if let Some(level) = &self.log_level {
            general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            general.log_format = format.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            general.pid_file = pid_file.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testgrid_core::config::GeneralConfig;

    #[test]
    fn defaults() {
        let cli = DaemonCli::try_parse_from(["testgrid-daemon"]).expect("parse");
        assert_eq!(cli.config, PathBuf::from("/etc/testgrid/testgrid.toml"));
        assert!(!cli.validate);
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn overrides_win_over_config() {
        let cli = DaemonCli::try_parse_from([
            "testgrid-daemon",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--pid-file",
            "/tmp/testgrid.pid",
        ])
        .expect("parse");
        let mut general = GeneralConfig::default();
        cli.apply_overrides(&mut general);
        assert_eq!(general.log_level, "debug");
        assert_eq!(general.log_format, "pretty");
        assert_eq!(general.pid_file, "/tmp/testgrid.pid");
    }

    #[test]
    fn verify_command() {
        use clap::CommandFactory;
        DaemonCli::command().debug_assert();
    }
}
