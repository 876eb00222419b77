//! Error handling for the dummy neighbor CLI

use neighbor_core::NeighborError;
use thiserror::Error;

/// Exit status for a clean stop
pub const EXIT_OK: u8 = 0;
/// Exit status for bind failures and other runtime errors
pub const EXIT_RUNTIME: u8 = 1;
/// Exit status when nothing was started because the input was invalid
pub const EXIT_CONFIGURATION: u8 = 2;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Neighbor(#[from] NeighborError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("Signal handling error: {0}")]
    Signal(String),
}

impl CliError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Neighbor(e) if e.is_configuration() => EXIT_CONFIGURATION,
            CliError::Config(_) | CliError::TomlParsing(_) => EXIT_CONFIGURATION,
            CliError::Neighbor(_) | CliError::Io(_) | CliError::Signal(_) => EXIT_RUNTIME,
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use neighbor_core::ConfigError;

    #[test]
    fn test_exit_codes() {
        let unknown: CliError = NeighborError::from(ConfigError::UnknownScenario {
            id: "9.9".to_string(),
        })
        .into();
        assert_eq!(unknown.exit_code(), EXIT_CONFIGURATION);

        let bind: CliError = NeighborError::Bind {
            address: "127.0.0.1:1".to_string(),
            reason: "permission denied".to_string(),
        }
        .into();
        assert_eq!(bind.exit_code(), EXIT_RUNTIME);

        assert_eq!(
            CliError::Config("bad".to_string()).exit_code(),
            EXIT_CONFIGURATION
        );
    }
}
