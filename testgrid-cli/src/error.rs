//! CLI-specific error types and exit code mapping

use testgrid_core::error::{QueryError, TestGridError};

/// CLI-specific error type.
///
/// The `exit_code()` method maps each variant to a process exit code.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Rejected input (unknown channel, unknown test engine, empty field).
    #[error("{0}")]
    Validation(String),

    /// Storage could not be read or written.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                  |
    /// |------|--------------------------|
    /// | 0    | Success                  |
    /// | 1    | General / command error  |
    /// | 2    | Configuration error      |
    /// | 3    | Validation error         |
    /// | 5    | Persistence failure      |
    /// | 10   | IO error                 |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Validation(_) => 3,
            Self::Persistence(_) => 5,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<TestGridError> for CliError {
    fn from(e: TestGridError) -> Self {
        match e {
            TestGridError::Config(e) => Self::Config(e.to_string()),
            TestGridError::Validation(e) => Self::Validation(e.to_string()),
            TestGridError::Storage(e) => Self::Persistence(e.to_string()),
            TestGridError::Query(e) => e.into(),
            TestGridError::Io(e) => Self::Io(e),
            e @ (TestGridError::Model(_) | TestGridError::Coordinator(_)) => {
                Self::Command(e.to_string())
            }
        }
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::NotFound { .. } => Self::Command(e.to_string()),
            QueryError::Infrastructure(e) => Self::Persistence(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testgrid_core::error::{ConfigError, StorageError, ValidationError};

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn test_exit_code_command_error() {
        let err = CliError::Command("test error".to_owned());
        assert_eq!(err.exit_code(), 1, "command error should return exit code 1");
    }

    #[test]
    fn test_unknown_channel_maps_to_validation() {
        let err: CliError =
            TestGridError::from(ValidationError::UnknownChannel("BETA".to_owned())).into();
        assert_eq!(err.exit_code(), 3, "unknown channel should return exit code 3");
        assert_eq!(
            err.to_string(),
            "Channel BETA is not defined in the available channels enum",
            "validation message should be shown verbatim"
        );
    }

    #[test]
    fn test_storage_error_maps_to_persistence() {
        let err: CliError =
            TestGridError::from(StorageError::Serialization("bad snapshot".to_owned())).into();
        assert_eq!(err.exit_code(), 5, "storage failure should return exit code 5");
        assert!(err.to_string().contains("bad snapshot"));
    }

    #[test]
    fn test_core_config_error_maps_to_config() {
        let err: CliError = TestGridError::from(ConfigError::FileNotFound {
            path: "/missing.toml".to_owned(),
        })
        .into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("/missing.toml"));
    }

    #[test]
    fn test_not_found_query_is_command_error() {
        let err: CliError = QueryError::NotFound {
            entity: "TestPlan",
            id: "nope".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "Unable to find the requested TestPlan by id : 'nope'"
        );
    }

    #[test]
    fn test_query_infrastructure_is_persistence() {
        let err: CliError = TestGridError::from(QueryError::Infrastructure(
            StorageError::Constraint("broken".to_owned()),
        ))
        .into();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_error_display_config() {
        let err = CliError::Config("invalid field".to_owned());
        assert_eq!(err.to_string(), "configuration error: invalid field");
    }

    #[test]
    fn test_json_serialize_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid json")
            .expect_err("should fail to parse invalid JSON");
        let err = CliError::from(json_err);
        assert_eq!(err.exit_code(), 1, "json error should return exit code 1");
    }
}
