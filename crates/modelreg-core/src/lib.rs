//! modelreg Core - Registration, promotion and query services
//!
//! This crate turns experiment runs into immutable model versions and governs
//! how those versions move through named aliases:
//!
//! - **RegistrationService**: consults the experiment tracker and artifact
//!   store, then records an immutable version (idempotent per run)
//! - **PromotionEngine**: alias set/unset, metric-gated promotion, rollback
//! - **QueryService**: read-only listings and lookups
//! - **Dispatcher**: routes the closed set of registry commands
//!
//! Collaborators are injected as trait objects; nothing here holds global
//! state.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod artifact;
pub mod command;
pub mod config;
pub mod error;
pub mod gate;
pub mod promotion;
pub mod query;
pub mod registration;
pub mod retry;
pub mod tracker;

// Re-exports
pub use artifact::{
    ArtifactError, ArtifactStore, HttpArtifactStore, InMemoryArtifactStore, LocalArtifactStore,
    UriArtifactStore,
};
pub use command::{Command, Dispatcher, Outcome};
pub use config::RegistryConfig;
pub use error::{ErrorKind, RegistryError, Result};
pub use gate::GateDecision;
pub use promotion::{AliasUpdate, PromotionEngine, PromotionOutcome, PromotionRequest};
pub use query::{ModelInfo, ModelSummary, QueryService};
pub use registration::{
    Registration, RegistrationRequest, RegistrationService, RegistrationSettings,
};
pub use retry::RetryPolicy;
pub use tracker::{DirectoryTracker, ExperimentTracker, InMemoryTracker, MlflowTracker, TrackerError};
