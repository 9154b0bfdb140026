//! File-backed registry store
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/models/<model>.json   model document
//! <root>/models/<model>.lock   present while a writer owns the model
//! ```
//!
//! Writers take an in-process mutex (so tasks in one process queue instead of
//! spinning on the lock file) and then the lock file (so separate processes
//! serialize). Documents are written to a temporary file, synced, and renamed
//! into place; readers see either the previous or the next document.

use crate::document::{AliasPrecondition, ModelDocument};
use crate::error::{Result, StoreError};
use crate::lock::LockFile;
use crate::store::RegistryStore;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use modelreg_types::{AliasChange, AliasName, ModelName, ModelVersion, NewModelVersion, VersionNumber};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

const MODELS_DIR: &str = "models";
const DOCUMENT_EXT: &str = "json";
const LOCK_EXT: &str = "lock";

/// Lock acquisition behaviour
#[derive(Debug, Clone)]
pub struct LockOptions {
    /// Attempts before giving up with `LockContended`
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Locks older than this are assumed abandoned; `None` never breaks locks
    pub stale_after: Option<Duration>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
            stale_after: Some(Duration::from_secs(30)),
        }
    }
}

/// File-backed registry store
pub struct FileRegistryStore {
    models_dir: PathBuf,
    options: LockOptions,
    local_locks: DashMap<ModelName, Arc<Mutex<()>>>,
}

impl FileRegistryStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(root, LockOptions::default()).await
    }

    pub async fn open_with_options(root: impl AsRef<Path>, options: LockOptions) -> Result<Self> {
        let models_dir = root.as_ref().join(MODELS_DIR);
        tokio::fs::create_dir_all(&models_dir).await?;
        info!(path = %models_dir.display(), "opened file registry store");
        Ok(Self {
            models_dir,
            options,
            local_locks: DashMap::new(),
        })
    }

    fn document_path(&self, model: &ModelName) -> PathBuf {
        self.models_dir.join(format!("{}.{}", model, DOCUMENT_EXT))
    }

    fn lock_path(&self, model: &ModelName) -> PathBuf {
        self.models_dir.join(format!("{}.{}", model, LOCK_EXT))
    }

    fn local_lock(&self, model: &ModelName) -> Arc<Mutex<()>> {
        self.local_locks
            .entry(model.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    async fn read_document(&self, model: &ModelName) -> Result<Option<ModelDocument>> {
        let bytes = match tokio::fs::read(self.document_path(model)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let doc: ModelDocument =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                model: model.to_string(),
                reason: e.to_string(),
            })?;
        if &doc.name != model {
            return Err(StoreError::Corrupt {
                model: model.to_string(),
                reason: format!("document names model {}", doc.name),
            });
        }
        doc.validate()?;
        Ok(Some(doc))
    }

    async fn write_document(&self, doc: &ModelDocument) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp_path = self
            .models_dir
            .join(format!(".{}.{}.tmp", doc.name, uuid::Uuid::new_v4()));

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp_path, self.document_path(&doc.name)).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Load, mutate and persist one model's document while holding its locks.
    async fn mutate<T>(
        &self,
        model: &ModelName,
        create: bool,
        f: impl FnOnce(&mut ModelDocument) -> Result<T>,
    ) -> Result<T> {
        let local = self.local_lock(model);
        let _local = local.lock().await;
        let _file = LockFile::acquire(self.lock_path(model), model, &self.options).await?;

        let mut doc = match self.read_document(model).await? {
            Some(doc) => doc,
            None if create => ModelDocument::new(model.clone(), Utc::now()),
            None => return Err(StoreError::ModelNotFound(model.clone())),
        };
        let before = (doc.versions.len(), doc.alias_log.len());
        let out = f(&mut doc)?;
        if (doc.versions.len(), doc.alias_log.len()) != before {
            self.write_document(&doc).await?;
        }
        Ok(out)
    }
}

#[async_trait]
impl RegistryStore for FileRegistryStore {
    async fn create_version(&self, draft: NewModelVersion) -> Result<ModelVersion> {
        let model = draft.model_name.clone();
        let created = self
            .mutate(&model, true, |doc| doc.append_version(draft, Utc::now()))
            .await?;
        debug!(model = %created.model_name, version = %created.version, "version persisted");
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
        self.mutate(model, false, |doc| {
            doc.update_alias(alias, target, precondition, &change, Utc::now())
        })
        .await
    }

    async fn snapshot(&self, model: &ModelName) -> Result<Arc<ModelDocument>> {
        self.read_document(model)
            .await?
            .filter(ModelDocument::is_published)
            .map(Arc::new)
            .ok_or_else(|| StoreError::ModelNotFound(model.clone()))
    }

    async fn list_models(&self) -> Result<Vec<ModelName>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.models_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Temp files start with '.', which model names cannot.
            if let Ok(name) = ModelName::new(stem) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelreg_types::RunId;

    fn model() -> ModelName {
        ModelName::new("churn").unwrap()
    }

    fn draft(run: &str) -> NewModelVersion {
        NewModelVersion::new(model(), RunId::new(run).unwrap(), format!("file:///a/{}", run))
            .with_metric("auc", 0.8)
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileRegistryStore::open(dir.path()).await.unwrap();
            store.create_version(draft("r1")).await.unwrap();
            store
                .set_alias(
                    &model(),
                    &AliasName::champion(),
                    VersionNumber::FIRST,
                    AliasChange::set("alice"),
                )
                .await
                .unwrap();
        }

        let reopened = FileRegistryStore::open(dir.path()).await.unwrap();
        let doc = reopened.snapshot(&model()).await.unwrap();
        assert_eq!(doc.versions.len(), 1);
        assert_eq!(doc.alias(&AliasName::champion()).unwrap(), VersionNumber::FIRST);
        assert_eq!(doc.alias_log.len(), 1);
        assert_eq!(reopened.list_models().await.unwrap(), vec![model()]);
    }

    #[tokio::test]
    async fn test_lock_released_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRegistryStore::open(dir.path()).await.unwrap();
        store.create_version(draft("r1")).await.unwrap();
        assert!(!store.lock_path(&model()).exists());
    }

    #[tokio::test]
    async fn test_held_lock_surfaces_contention() {
        let dir = tempfile::tempdir().unwrap();
        let options = LockOptions {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            stale_after: None,
        };
        let store = FileRegistryStore::open_with_options(dir.path(), options)
            .await
            .unwrap();
        std::fs::write(store.lock_path(&model()), b"4242\n").unwrap();

        let err = store.create_version(draft("r1")).await.unwrap_err();
        assert!(matches!(err, StoreError::LockContended { attempts: 3, .. }));
        assert!(err.is_conflict());
        assert!(store.list_models().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let options = LockOptions {
            stale_after: Some(Duration::ZERO),
            ..LockOptions::default()
        };
        let store = FileRegistryStore::open_with_options(dir.path(), options)
            .await
            .unwrap();
        std::fs::write(store.lock_path(&model()), b"4242\n").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let v = store.create_version(draft("r1")).await.unwrap();
        assert_eq!(v.version, VersionNumber::FIRST);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRegistryStore::open(dir.path()).await.unwrap();
        std::fs::write(store.document_path(&model()), b"{not json").unwrap();

        assert!(matches!(
            store.snapshot(&model()).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_run_does_not_rewrite_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRegistryStore::open(dir.path()).await.unwrap();
        store.create_version(draft("r1")).await.unwrap();
        let before = std::fs::read(store.document_path(&model())).unwrap();

        let err = store.create_version(draft("r1")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRun { .. }));
        assert_eq!(std::fs::read(store.document_path(&model())).unwrap(), before);
    }
}
