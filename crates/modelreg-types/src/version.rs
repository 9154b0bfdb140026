//! Model version records
//!
//! A ModelVersion is created exactly once, by the store, and never mutated.
//! Metrics and tags are copied into the record at registration time so later
//! changes to the originating run cannot alter it.

use crate::{ModelName, RunId, VersionNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric name -> value
pub type Metrics = BTreeMap<String, f64>;

/// Tag key -> value
pub type Tags = BTreeMap<String, String>;

/// Immutable record of a registered model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub model_name: ModelName,

    /// Assigned by the store, strictly increasing per model
    pub version: VersionNumber,

    /// Run this version was registered from
    pub source_run_id: RunId,

    pub artifact_uri: String,

    /// Frozen copy of the run's metrics at registration time
    pub metrics: Metrics,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_by: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl ModelVersion {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// Draft of a version before the store assigns its number
#[derive(Debug, Clone, PartialEq)]
pub struct NewModelVersion {
    pub model_name: ModelName,
    pub source_run_id: RunId,
    pub artifact_uri: String,
    pub metrics: Metrics,
    pub description: Option<String>,
    pub tags: Tags,
    pub registered_by: Option<String>,
}

impl NewModelVersion {
    pub fn new(model_name: ModelName, source_run_id: RunId, artifact_uri: impl Into<String>) -> Self {
        Self {
            model_name,
            source_run_id,
            artifact_uri: artifact_uri.into(),
            metrics: Metrics::new(),
            description: None,
            tags: Tags::new(),
            registered_by: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn registered_by(mut self, actor: impl Into<String>) -> Self {
        self.registered_by = Some(actor.into());
        self
    }

    /// Seal the draft into an immutable record.
    pub fn into_version(self, version: VersionNumber, created_at: DateTime<Utc>) -> ModelVersion {
        ModelVersion {
            model_name: self.model_name,
            version,
            source_run_id: self.source_run_id,
            artifact_uri: self.artifact_uri,
            metrics: self.metrics,
            description: self.description,
            tags: self.tags,
            registered_by: self.registered_by,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_version_keeps_draft_fields() {
        let draft = NewModelVersion::new(
            ModelName::new("churn").unwrap(),
            RunId::new("r1").unwrap(),
            "file:///artifacts/r1/model",
        )
        .with_metric("auc", 0.81)
        .with_description(Some("baseline".into()))
        .registered_by("alice");

        let v = draft.into_version(VersionNumber::FIRST, Utc::now());
        assert_eq!(v.version, VersionNumber::FIRST);
        assert_eq!(v.metric("auc"), Some(0.81));
        assert_eq!(v.metric("f1_score"), None);
        assert_eq!(v.description.as_deref(), Some("baseline"));
        assert_eq!(v.registered_by.as_deref(), Some("alice"));
    }
}
