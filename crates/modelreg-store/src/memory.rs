//! In-memory registry store
//!
//! Suitable for tests and for embedding the registry in a long-lived process.
//! Each model has a writer mutex and a published `Arc<ModelDocument>`.
//! Writers clone the published document, mutate the clone, and swap it in;
//! readers only clone the `Arc`, so they never wait for a writer to finish.

use crate::document::{AliasPrecondition, ModelDocument};
use crate::error::{Result, StoreError};
use crate::store::RegistryStore;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use modelreg_types::{AliasChange, AliasName, ModelName, ModelVersion, NewModelVersion, VersionNumber};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

struct ModelSlot {
    writer: Mutex<()>,
    published: RwLock<Arc<ModelDocument>>,
}

impl ModelSlot {
    fn new(doc: ModelDocument) -> Self {
        Self {
            writer: Mutex::new(()),
            published: RwLock::new(Arc::new(doc)),
        }
    }

    fn current(&self) -> Arc<ModelDocument> {
        self.published.read().clone()
    }
}

/// In-memory registry store
pub struct InMemoryRegistryStore {
    models: DashMap<ModelName, Arc<ModelSlot>>,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self {
            models: DashMap::new(),
        }
    }

    fn slot(&self, model: &ModelName) -> Option<Arc<ModelSlot>> {
        self.models.get(model).map(|s| s.value().clone())
    }

    fn slot_or_create(&self, model: &ModelName) -> Arc<ModelSlot> {
        self.models
            .entry(model.clone())
            .or_insert_with(|| Arc::new(ModelSlot::new(ModelDocument::new(model.clone(), Utc::now()))))
            .value()
            .clone()
    }

    /// Run `f` against a private copy of the document and publish it on success.
    async fn mutate<T>(
        slot: &ModelSlot,
        f: impl FnOnce(&mut ModelDocument) -> Result<T>,
    ) -> Result<T> {
        let _writer = slot.writer.lock().await;
        let mut doc = ModelDocument::clone(&slot.current());
        let out = f(&mut doc)?;
        *slot.published.write() = Arc::new(doc);
        Ok(out)
    }
}

impl Default for InMemoryRegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn create_version(&self, draft: NewModelVersion) -> Result<ModelVersion> {
        let slot = self.slot_or_create(&draft.model_name);
        let created = Self::mutate(&slot, |doc| doc.append_version(draft, Utc::now())).await?;
        debug!(model = %created.model_name, version = %created.version, "version stored");
        Ok(created)
    }

    async fn update_alias(
        &self,
        model: &ModelName,
        alias: &AliasName,
        target: Option<VersionNumber>,
        precondition: AliasPrecondition,
        change: AliasChange,
    ) -> Result<Option<VersionNumber>> {
        let slot = self
            .slot(model)
            .filter(|s| s.current().is_published())
            .ok_or_else(|| StoreError::ModelNotFound(model.clone()))?;
        Self::mutate(&slot, |doc| {
            doc.update_alias(alias, target, precondition, &change, Utc::now())
        })
        .await
    }

    async fn snapshot(&self, model: &ModelName) -> Result<Arc<ModelDocument>> {
        self.slot(model)
            .map(|s| s.current())
            .filter(|doc| doc.is_published())
            .ok_or_else(|| StoreError::ModelNotFound(model.clone()))
    }

    async fn list_models(&self) -> Result<Vec<ModelName>> {
        let mut names: Vec<ModelName> = self
            .models
            .iter()
            .filter(|entry| entry.value().current().is_published())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
