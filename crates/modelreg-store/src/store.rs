//! Registry store trait
//!
//! Backends implement four primitives: version creation, alias mutation,
//! snapshot reads and model listing. Every other operation is derived from a
//! snapshot, so all reads of one model come from a single consistent view.

use crate::document::{AliasPrecondition, ModelDocument};
use crate::error::Result;
use async_trait::async_trait;
use modelreg_types::{
    AliasChange, AliasChangeLogEntry, AliasName, ModelName, ModelVersion, NewModelVersion, RunId,
    VersionNumber,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Persistent keyed storage of model versions and aliases
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Allocate the next version number for the draft's model and persist the
    /// record in the same critical section.
    ///
    /// Fails with `DuplicateRun` if the model already has a version sourced
    /// from the same run.
    async fn create_version(&self, draft: NewModelVersion) -> Result<ModelVersion>;

    /// Retarget or remove an alias, appending a log entry on every change.
    ///
    /// `target = None` removes the alias. Returns the previous target.
    async fn update_alias(
        &self,
        model: &ModelName,
        alias: &AliasName,
        target: Option<VersionNumber>,
        precondition: AliasPrecondition,
        change: AliasChange,
    ) -> Result<Option<VersionNumber>>;

    /// Consistent view of one model; `ModelNotFound` if it has no versions.
    async fn snapshot(&self, model: &ModelName) -> Result<Arc<ModelDocument>>;

    /// Names of all models with at least one version, sorted.
    async fn list_models(&self) -> Result<Vec<ModelName>>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;

    async fn get_version(&self, model: &ModelName, version: VersionNumber) -> Result<ModelVersion> {
        let doc = self.snapshot(model).await?;
        doc.version(version).cloned()
    }

    /// Ascending by version number.
    async fn list_versions(&self, model: &ModelName) -> Result<Vec<ModelVersion>> {
        Ok(self.snapshot(model).await?.versions.clone())
    }

    async fn latest_version(&self, model: &ModelName) -> Result<ModelVersion> {
        let doc = self.snapshot(model).await?;
        match doc.latest_version() {
            Some(latest) => doc.version(latest).cloned(),
            None => Err(crate::StoreError::ModelNotFound(model.clone())),
        }
    }

    /// `Ok(None)` when either the model or the run is unknown.
    async fn find_version_by_run(
        &self,
        model: &ModelName,
        run_id: &RunId,
    ) -> Result<Option<ModelVersion>> {
        match self.snapshot(model).await {
            Ok(doc) => Ok(doc.find_by_run(run_id).cloned()),
            Err(crate::StoreError::ModelNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_alias(
        &self,
        model: &ModelName,
        alias: &AliasName,
        version: VersionNumber,
        change: AliasChange,
    ) -> Result<Option<VersionNumber>> {
        self.update_alias(model, alias, Some(version), AliasPrecondition::Any, change)
            .await
    }

    /// Set only if the alias currently points at `expected`.
    async fn compare_and_set_alias(
        &self,
        model: &ModelName,
        alias: &AliasName,
        expected: Option<VersionNumber>,
        version: VersionNumber,
        change: AliasChange,
    ) -> Result<Option<VersionNumber>> {
        self.update_alias(
            model,
            alias,
            Some(version),
            AliasPrecondition::Current(expected),
            change,
        )
        .await
    }

    /// Idempotent; removing an unassigned alias returns `Ok(None)`.
    async fn unset_alias(
        &self,
        model: &ModelName,
        alias: &AliasName,
        change: AliasChange,
    ) -> Result<Option<VersionNumber>> {
        self.update_alias(model, alias, None, AliasPrecondition::Any, change)
            .await
    }

    async fn get_alias(&self, model: &ModelName, alias: &AliasName) -> Result<VersionNumber> {
        self.snapshot(model).await?.alias(alias)
    }

    async fn list_aliases(&self, model: &ModelName) -> Result<BTreeMap<AliasName, VersionNumber>> {
        Ok(self.snapshot(model).await?.aliases.clone())
    }

    async fn alias_history(
        &self,
        model: &ModelName,
        alias: Option<&AliasName>,
    ) -> Result<Vec<AliasChangeLogEntry>> {
        Ok(self.snapshot(model).await?.history(alias))
    }
}
