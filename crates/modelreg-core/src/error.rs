//! Service error types
//!
//! Every failure a registry operation can report maps onto one
//! [`ErrorKind`], and each kind has a fixed process exit code.

use crate::artifact::ArtifactError;
use crate::tracker::TrackerError;
use modelreg_store::StoreError;
use modelreg_types::{AliasName, ModelName, NameError, PolicyConfigError, RunId, VersionNumber};
use thiserror::Error;

/// Coarse classification used for exit codes and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    NotFound,
    ArtifactUnreachable,
    Conflict,
    Unavailable,
    Rejected,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Usage => 1,
            ErrorKind::NotFound => 2,
            ErrorKind::ArtifactUnreachable | ErrorKind::Conflict | ErrorKind::Unavailable => 3,
            ErrorKind::Rejected => 4,
        }
    }
}

/// Registry service errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid request: {0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model not found: {0}")]
    ModelNotFound(ModelName),

    #[error("Version not found: {model} v{version}")]
    VersionNotFound {
        model: ModelName,
        version: VersionNumber,
    },

    #[error("Alias not found: {model}@{alias}")]
    AliasNotFound { model: ModelName, alias: AliasName },

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Artifact unreachable: {uri}: {reason}")]
    ArtifactUnreachable { uri: String, reason: String },

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Promotion of {model} v{candidate} to {alias} rejected: {reason}")]
    PromotionRejected {
        model: ModelName,
        alias: AliasName,
        candidate: VersionNumber,
        reason: String,
    },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Usage(_) | RegistryError::Config(_) => ErrorKind::Usage,
            RegistryError::ModelNotFound(_)
            | RegistryError::VersionNotFound { .. }
            | RegistryError::AliasNotFound { .. }
            | RegistryError::RunNotFound(_) => ErrorKind::NotFound,
            RegistryError::ArtifactUnreachable { .. } => ErrorKind::ArtifactUnreachable,
            RegistryError::ConcurrencyConflict(_) => ErrorKind::Conflict,
            RegistryError::BackendUnavailable(_) => ErrorKind::Unavailable,
            RegistryError::PromotionRejected { .. } => ErrorKind::Rejected,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }

    /// Worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Conflict | ErrorKind::Unavailable
        )
    }
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ModelNotFound(model) => RegistryError::ModelNotFound(model),
            StoreError::VersionNotFound { model, version } => {
                RegistryError::VersionNotFound { model, version }
            }
            StoreError::AliasNotFound { model, alias } => {
                RegistryError::AliasNotFound { model, alias }
            }
            e @ (StoreError::AliasConflict { .. }
            | StoreError::LockContended { .. }
            | StoreError::DuplicateRun { .. }) => RegistryError::ConcurrencyConflict(e.to_string()),
            e @ (StoreError::Corrupt { .. } | StoreError::Io(_) | StoreError::Serialization(_)) => {
                RegistryError::BackendUnavailable(e.to_string())
            }
        }
    }
}

impl From<NameError> for RegistryError {
    fn from(err: NameError) -> Self {
        RegistryError::Usage(err.to_string())
    }
}

impl From<PolicyConfigError> for RegistryError {
    fn from(err: PolicyConfigError) -> Self {
        RegistryError::Config(err.to_string())
    }
}

impl From<TrackerError> for RegistryError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::RunNotFound(run_id) => RegistryError::RunNotFound(run_id),
            e @ (TrackerError::Unavailable(_) | TrackerError::InvalidResponse(_)) => {
                RegistryError::BackendUnavailable(e.to_string())
            }
        }
    }
}

impl From<ArtifactError> for RegistryError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Unavailable(reason) => RegistryError::BackendUnavailable(reason),
            ArtifactError::UnsupportedScheme(uri) => RegistryError::ArtifactUnreachable {
                reason: "unsupported URI scheme".to_string(),
                uri,
            },
        }
    }
}

impl From<config::ConfigError> for RegistryError {
    fn from(err: config::ConfigError) -> Self {
        RegistryError::Config(err.to_string())
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_kind() {
        let model = ModelName::new("churn").unwrap();
        assert_eq!(RegistryError::Usage("bad".into()).exit_code(), 1);
        assert_eq!(RegistryError::ModelNotFound(model.clone()).exit_code(), 2);
        assert_eq!(
            RegistryError::RunNotFound(RunId::new("r1").unwrap()).exit_code(),
            2
        );
        assert_eq!(
            RegistryError::ArtifactUnreachable {
                uri: "s3://x".into(),
                reason: "missing".into()
            }
            .exit_code(),
            3
        );
        assert_eq!(RegistryError::ConcurrencyConflict("x".into()).exit_code(), 3);
        assert_eq!(RegistryError::BackendUnavailable("x".into()).exit_code(), 3);
        assert_eq!(
            RegistryError::PromotionRejected {
                model,
                alias: AliasName::champion(),
                candidate: VersionNumber::FIRST,
                reason: "worse".into()
            }
            .exit_code(),
            4
        );
    }

    #[test]
    fn test_store_errors_map_to_service_errors() {
        let model = ModelName::new("churn").unwrap();
        let err: RegistryError = StoreError::LockContended {
            model: model.clone(),
            attempts: 3,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.is_transient());

        let err: RegistryError = StoreError::AliasNotFound {
            model,
            alias: AliasName::staging(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!err.is_transient());
    }
}
