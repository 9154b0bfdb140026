//! Per-model registry state
//!
//! A `ModelDocument` holds everything the registry knows about one model:
//! its versions in creation order, its alias map, and the alias change log.
//! Backends load a document, apply one mutation through the methods here, and
//! publish the result atomically. The methods never leave a document
//! half-modified: they validate first and mutate only when nothing can fail.

use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use modelreg_types::{
    AliasChange, AliasChangeLogEntry, AliasName, ModelName, ModelVersion, NewModelVersion, RunId,
    VersionNumber,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current on-disk document format
pub const FORMAT_VERSION: u32 = 1;

/// Condition an alias must satisfy for a mutation to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasPrecondition {
    /// Apply unconditionally
    Any,
    /// Apply only if the alias currently points at this value (`None` = unassigned)
    Current(Option<VersionNumber>),
}

/// All registry state for a single model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    pub format_version: u32,
    pub name: ModelName,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Ordered by version number; version `n` is at index `n - 1`
    #[serde(default)]
    pub versions: Vec<ModelVersion>,

    #[serde(default)]
    pub aliases: BTreeMap<AliasName, VersionNumber>,

    /// Append-only
    #[serde(default)]
    pub alias_log: Vec<AliasChangeLogEntry>,
}

impl ModelDocument {
    pub fn new(name: ModelName, now: DateTime<Utc>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            name,
            created_at: now,
            updated_at: now,
            versions: Vec::new(),
            aliases: BTreeMap::new(),
            alias_log: Vec::new(),
        }
    }

    /// A document is visible to readers once it holds at least one version.
    pub fn is_published(&self) -> bool {
        !self.versions.is_empty()
    }

    pub fn latest_version(&self) -> Option<VersionNumber> {
        self.versions.last().map(|v| v.version)
    }

    pub fn next_version(&self) -> VersionNumber {
        self.latest_version()
            .map(VersionNumber::next)
            .unwrap_or(VersionNumber::FIRST)
    }

    pub fn version(&self, version: VersionNumber) -> Result<&ModelVersion> {
        usize::try_from(version.get() - 1)
            .ok()
            .and_then(|idx| self.versions.get(idx))
            .ok_or_else(|| StoreError::VersionNotFound {
                model: self.name.clone(),
                version,
            })
    }

    pub fn find_by_run(&self, run_id: &RunId) -> Option<&ModelVersion> {
        self.versions.iter().find(|v| &v.source_run_id == run_id)
    }

    pub fn alias(&self, alias: &AliasName) -> Result<VersionNumber> {
        self.aliases
            .get(alias)
            .copied()
            .ok_or_else(|| StoreError::AliasNotFound {
                model: self.name.clone(),
                alias: alias.clone(),
            })
    }

    /// Log entries, oldest first, optionally restricted to one alias.
    pub fn history(&self, alias: Option<&AliasName>) -> Vec<AliasChangeLogEntry> {
        self.alias_log
            .iter()
            .filter(|e| alias.map_or(true, |a| &e.alias_name == a))
            .cloned()
            .collect()
    }

    /// Allocate the next version number and append the sealed record.
    pub fn append_version(
        &mut self,
        draft: NewModelVersion,
        now: DateTime<Utc>,
    ) -> Result<ModelVersion> {
        if draft.model_name != self.name {
            return Err(StoreError::Corrupt {
                model: self.name.to_string(),
                reason: format!("draft targets model {}", draft.model_name),
            });
        }
        if let Some(existing) = self.find_by_run(&draft.source_run_id) {
            return Err(StoreError::DuplicateRun {
                model: self.name.clone(),
                run_id: draft.source_run_id,
                existing: existing.version,
            });
        }

        let record = draft.into_version(self.next_version(), now);
        self.versions.push(record.clone());
        self.updated_at = now;
        Ok(record)
    }

    /// Point `alias` at `target`, or remove it when `target` is `None`.
    ///
    /// Returns the previous target. Removing an unassigned alias is a no-op
    /// and writes no log entry.
    pub fn update_alias(
        &mut self,
        alias: &AliasName,
        target: Option<VersionNumber>,
        precondition: AliasPrecondition,
        change: &AliasChange,
        now: DateTime<Utc>,
    ) -> Result<Option<VersionNumber>> {
        let current = self.aliases.get(alias).copied();

        if let AliasPrecondition::Current(expected) = precondition {
            if expected != current {
                return Err(StoreError::AliasConflict {
                    model: self.name.clone(),
                    alias: alias.clone(),
                    expected,
                    actual: current,
                });
            }
        }

        match target {
            Some(version) => {
                self.version(version)?;
                self.aliases.insert(alias.clone(), version);
            }
            None if current.is_none() => return Ok(None),
            None => {
                self.aliases.remove(alias);
            }
        }

        self.alias_log.push(AliasChangeLogEntry {
            model_name: self.name.clone(),
            alias_name: alias.clone(),
            old_version: current,
            new_version: target,
            timestamp: now,
            actor: change.actor.clone(),
            reason: change.reason,
        });
        self.updated_at = now;
        Ok(current)
    }

    /// Structural checks for documents loaded from outside the process.
    pub fn validate(&self) -> Result<()> {
        let corrupt = |reason: String| StoreError::Corrupt {
            model: self.name.to_string(),
            reason,
        };

        if self.format_version > FORMAT_VERSION {
            return Err(corrupt(format!(
                "format version {} is newer than supported {}",
                self.format_version, FORMAT_VERSION
            )));
        }
        for (idx, v) in self.versions.iter().enumerate() {
            let expected = idx as u64 + 1;
            if v.version.get() != expected {
                return Err(corrupt(format!(
                    "version at position {} is v{}, expected v{}",
                    idx, v.version, expected
                )));
            }
            if v.model_name != self.name {
                return Err(corrupt(format!("v{} belongs to {}", v.version, v.model_name)));
            }
        }
        for (alias, version) in &self.aliases {
            if self.version(*version).is_err() {
                return Err(corrupt(format!("alias {} points at missing v{}", alias, version)));
            }
        }
        Ok(())
    }
}
