//! modelreg Types - Core types for the model registry
//!
//! The registry turns finished experiment runs into immutable, numbered model
//! versions and lets operators point named aliases at them.
//!
//! ## Key Concepts
//!
//! - **ModelVersion**: Immutable record of a registered artifact and its frozen metrics
//! - **Alias**: Mutable pointer from a name (`champion`, `staging`, ...) to one version
//! - **AliasChangeLogEntry**: Append-only audit record of every alias mutation
//! - **RunRecord**: What the experiment tracker knows about a training run
//! - **PromotionPolicy**: Metric gate applied before an alias is moved by promotion

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod alias;
pub mod error;
pub mod ids;
pub mod policy;
pub mod run;
pub mod selector;
pub mod version;

// Re-export main types
pub use alias::{AliasChange, AliasChangeLogEntry, AliasChangeReason, CHAMPION, PRODUCTION, STAGING};
pub use error::NameError;
pub use ids::{AliasName, ModelName, RunId, VersionNumber};
pub use policy::{
    Comparison, MetricGoal, PolicyConfigError, PolicySet, PromotionPolicy, DEFAULT_PRIMARY_METRIC,
};
pub use run::{RunRecord, RunStatus};
pub use selector::VersionSelector;
pub use version::{Metrics, ModelVersion, NewModelVersion, Tags};
