//! Alias types and the alias audit log
//!
//! An alias is a mutable pointer from a name to exactly one version of a
//! model. Every mutation is recorded as an `AliasChangeLogEntry`; the log is
//! append-only and is what rollback reads from.

use crate::{AliasName, ModelName, VersionNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conventional alias for the version under evaluation
pub const STAGING: &str = "staging";

/// Conventional alias for the currently promoted version
pub const CHAMPION: &str = "champion";

/// Conventional alias for the version serving production traffic
pub const PRODUCTION: &str = "production";

/// Why an alias moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AliasChangeReason {
    /// Direct assignment
    Set,
    /// Promotion that passed the policy gate (or had no incumbent)
    Promote,
    /// Promotion that bypassed the policy gate
    ForcePromote,
    /// Explicit removal
    Unset,
    /// Restored to the value before the previous change
    Rollback,
    /// Source alias removed after its version was promoted
    ClearedAfterPromotion,
}

impl fmt::Display for AliasChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Set => "set",
            Self::Promote => "promote",
            Self::ForcePromote => "force-promote",
            Self::Unset => "unset",
            Self::Rollback => "rollback",
            Self::ClearedAfterPromotion => "cleared-after-promotion",
        };
        f.write_str(s)
    }
}

/// Who is changing an alias and why; recorded verbatim in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasChange {
    pub actor: String,
    pub reason: AliasChangeReason,
}

impl AliasChange {
    pub fn new(actor: impl Into<String>, reason: AliasChangeReason) -> Self {
        Self {
            actor: actor.into(),
            reason,
        }
    }

    pub fn set(actor: impl Into<String>) -> Self {
        Self::new(actor, AliasChangeReason::Set)
    }

    pub fn unset(actor: impl Into<String>) -> Self {
        Self::new(actor, AliasChangeReason::Unset)
    }
}

/// Append-only audit record of a single alias mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasChangeLogEntry {
    pub model_name: ModelName,
    pub alias_name: AliasName,

    /// Target before the change; `None` if the alias was unassigned
    pub old_version: Option<VersionNumber>,

    /// Target after the change; `None` if the alias was removed
    pub new_version: Option<VersionNumber>,

    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub reason: AliasChangeReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serialization() {
        let json = serde_json::to_string(&AliasChangeReason::ForcePromote).unwrap();
        assert_eq!(json, "\"force-promote\"");
        assert_eq!(
            AliasChangeReason::ClearedAfterPromotion.to_string(),
            "cleared-after-promotion"
        );
    }

    #[test]
    fn test_well_known_aliases_are_valid() {
        assert_eq!(AliasName::champion(), CHAMPION);
        assert_eq!(AliasName::staging(), STAGING);
        assert_eq!(AliasName::production(), PRODUCTION);
    }
}
