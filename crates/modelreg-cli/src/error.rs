//! CLI error types

use modelreg_core::RegistryError;
use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Error reported by the registry services
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML serialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// The dispatcher answered with an outcome the command cannot render
    #[error("Unexpected result from '{command}': {outcome}")]
    UnexpectedOutcome { command: String, outcome: String },

    /// Logging could not be installed
    #[error("Logging error: {0:#}")]
    Logging(anyhow::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Registry(err) => err.exit_code(),
            CliError::InvalidInput(_) => 1,
            CliError::Io(_)
            | CliError::Json(_)
            | CliError::Yaml(_)
            | CliError::Toml(_)
            | CliError::UnexpectedOutcome { .. }
            | CliError::Logging(_) => 3,
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
