//! Store error types

use modelreg_types::{AliasName, ModelName, RunId, VersionNumber};
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Model not found: {0}")]
    ModelNotFound(ModelName),

    #[error("Version not found: {model} v{version}")]
    VersionNotFound {
        model: ModelName,
        version: VersionNumber,
    },

    #[error("Alias not found: {model}@{alias}")]
    AliasNotFound { model: ModelName, alias: AliasName },

    #[error("Run {run_id} is already registered as {model} v{existing}")]
    DuplicateRun {
        model: ModelName,
        run_id: RunId,
        existing: VersionNumber,
    },

    #[error("Alias {model}@{alias} changed concurrently: expected {expected:?}, found {actual:?}")]
    AliasConflict {
        model: ModelName,
        alias: AliasName,
        expected: Option<VersionNumber>,
        actual: Option<VersionNumber>,
    },

    #[error("Lock for model {model} still held after {attempts} attempts")]
    LockContended { model: ModelName, attempts: u32 },

    #[error("Corrupt document for model {model}: {reason}")]
    Corrupt { model: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Transient contention; the operation may succeed if retried
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::AliasConflict { .. } | StoreError::LockContended { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ModelNotFound(_)
                | StoreError::VersionNotFound { .. }
                | StoreError::AliasNotFound { .. }
        )
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
