//! Query Service - read-only views of the registry
//!
//! Every answer about a model is built from a single store snapshot.

use crate::error::{RegistryError, Result};
use chrono::{DateTime, Utc};
use modelreg_store::{ModelDocument, RegistryStore};
use modelreg_types::{
    AliasChangeLogEntry, AliasName, ModelName, ModelVersion, VersionNumber, VersionSelector,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One row of the model listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub name: ModelName,
    pub latest_version: VersionNumber,
    pub version_count: usize,
    pub aliases: BTreeMap<AliasName, VersionNumber>,
    pub updated_at: DateTime<Utc>,
}

/// Full description of one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub name: ModelName,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub latest_version: VersionNumber,
    pub versions: Vec<ModelVersion>,
    pub aliases: BTreeMap<AliasName, VersionNumber>,
}

impl ModelInfo {
    fn from_document(doc: &ModelDocument) -> Result<Self> {
        let latest_version = doc
            .latest_version()
            .ok_or_else(|| RegistryError::ModelNotFound(doc.name.clone()))?;
        Ok(Self {
            name: doc.name.clone(),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            latest_version,
            versions: doc.versions.clone(),
            aliases: doc.aliases.clone(),
        })
    }
}

/// Read-only access to models, versions and aliases
pub struct QueryService {
    store: Arc<dyn RegistryStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    pub async fn list_models(&self) -> Result<Vec<ModelName>> {
        Ok(self.store.list_models().await?)
    }

    /// Summary of every model, sorted by name.
    pub async fn summaries(&self) -> Result<Vec<ModelSummary>> {
        let mut summaries = Vec::new();
        for name in self.store.list_models().await? {
            let doc = match self.store.snapshot(&name).await {
                Ok(doc) => doc,
                // Listed but not yet readable; skip rather than fail the listing.
                Err(e) if e.is_not_found() => {
                    debug!(model = %name, "model vanished from listing");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let Some(latest_version) = doc.latest_version() else {
                continue;
            };
            summaries.push(ModelSummary {
                name,
                latest_version,
                version_count: doc.versions.len(),
                aliases: doc.aliases.clone(),
                updated_at: doc.updated_at,
            });
        }
        Ok(summaries)
    }

    pub async fn info(&self, model: &ModelName) -> Result<ModelInfo> {
        let doc = self.store.snapshot(model).await?;
        ModelInfo::from_document(&doc)
    }

    /// Versions of `model`, ascending.
    pub async fn list_versions(&self, model: &ModelName) -> Result<Vec<ModelVersion>> {
        Ok(self.store.list_versions(model).await?)
    }

    pub async fn resolve(&self, model: &ModelName, selector: &VersionSelector) -> Result<ModelVersion> {
        let doc = self.store.snapshot(model).await?;
        let number = match selector {
            VersionSelector::Number(v) => *v,
            VersionSelector::Alias(alias) => doc.alias(alias)?,
            VersionSelector::Latest => doc
                .latest_version()
                .ok_or_else(|| RegistryError::ModelNotFound(model.clone()))?,
        };
        Ok(doc.version(number)?.clone())
    }

    /// Alias change log, oldest first.
    pub async fn history(
        &self,
        model: &ModelName,
        alias: Option<&AliasName>,
    ) -> Result<Vec<AliasChangeLogEntry>> {
        Ok(self.store.alias_history(model, alias).await?)
    }
}
