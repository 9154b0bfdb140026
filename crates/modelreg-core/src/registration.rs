//! Registration Service - turns finished runs into model versions
//!
//! Registration is all-or-nothing: the tracker and artifact store are
//! consulted first, and the version record is written in a single store call
//! only after both checks pass.

use crate::artifact::ArtifactStore;
use crate::error::{RegistryError, Result};
use crate::retry::{with_timeout, RetryPolicy};
use crate::tracker::ExperimentTracker;
use modelreg_store::{RegistryStore, StoreError};
use modelreg_types::{ModelName, ModelVersion, NewModelVersion, RunId, RunRecord, Tags, VersionNumber};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Request to register a run's artifact under a model name
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub run_id: RunId,
    pub model_name: ModelName,
    pub description: Option<String>,
    pub tags: Tags,
    pub actor: Option<String>,
}

impl RegistrationRequest {
    pub fn new(run_id: RunId, model_name: ModelName) -> Self {
        Self {
            run_id,
            model_name,
            description: None,
            tags: Tags::new(),
            actor: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Result of a registration
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub version: ModelVersion,
    /// `false` when the run was already registered and the existing version
    /// is returned
    pub created: bool,
}

/// Registration behaviour
#[derive(Debug, Clone)]
pub struct RegistrationSettings {
    /// Reject runs the tracker does not report as finished
    pub require_finished_run: bool,
    /// Bound on each tracker or artifact store call
    pub collaborator_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            require_finished_run: true,
            collaborator_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

enum Created {
    New(ModelVersion),
    Existing(VersionNumber),
}

/// Registers experiment runs as immutable model versions
pub struct RegistrationService {
    store: Arc<dyn RegistryStore>,
    tracker: Arc<dyn ExperimentTracker>,
    artifacts: Arc<dyn ArtifactStore>,
    settings: RegistrationSettings,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        tracker: Arc<dyn ExperimentTracker>,
        artifacts: Arc<dyn ArtifactStore>,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            store,
            tracker,
            artifacts,
            settings,
        }
    }

    /// Register `request.run_id` as the next version of `request.model_name`.
    ///
    /// Registering the same run under the same model again returns the
    /// existing version with `created = false`.
    #[instrument(skip(self, request), fields(model = %request.model_name, run_id = %request.run_id))]
    pub async fn register(&self, request: RegistrationRequest) -> Result<Registration> {
        // 1. Run metadata
        let run = self.fetch_run(&request.run_id).await?;
        if self.settings.require_finished_run && !run.status.is_finished() {
            return Err(RegistryError::Usage(format!(
                "run {} is {}, only finished runs can be registered",
                run.run_id, run.status
            )));
        }

        // 2. Artifact reachability
        self.check_artifact(&run.artifact_uri).await?;

        // 3 + 4. Idempotent create
        let mut draft = NewModelVersion::new(
            request.model_name.clone(),
            request.run_id.clone(),
            run.artifact_uri,
        )
        .with_metrics(run.metrics)
        .with_description(request.description)
        .with_tags(request.tags);
        if let Some(actor) = request.actor {
            draft = draft.registered_by(actor);
        }

        let created = self
            .settings
            .retry
            .run("store.create_version", |_| {
                let store = self.store.clone();
                let draft = draft.clone();
                async move {
                    match store.create_version(draft).await {
                        Ok(version) => Ok(Created::New(version)),
                        Err(StoreError::DuplicateRun { existing, .. }) => {
                            Ok(Created::Existing(existing))
                        }
                        Err(e) => Err(e.into()),
                    }
                }
            })
            .await?;

        match created {
            Created::New(version) => {
                info!(version = %version.version, "registered model version");
                Ok(Registration {
                    version,
                    created: true,
                })
            }
            Created::Existing(existing) => {
                info!(version = %existing, "run already registered, returning existing version");
                let version = self.store.get_version(&request.model_name, existing).await?;
                Ok(Registration {
                    version,
                    created: false,
                })
            }
        }
    }

    async fn fetch_run(&self, run_id: &RunId) -> Result<RunRecord> {
        let timeout = self.settings.collaborator_timeout;
        self.settings
            .retry
            .run("tracker.get_run", |_| {
                let tracker = self.tracker.clone();
                let run_id = run_id.clone();
                async move {
                    debug!(tracker = tracker.name(), run_id = %run_id, "fetching run");
                    with_timeout(timeout, "experiment tracker", tracker.get_run(&run_id)).await
                }
            })
            .await
    }

    async fn check_artifact(&self, uri: &str) -> Result<()> {
        if uri.trim().is_empty() {
            return Err(RegistryError::ArtifactUnreachable {
                uri: uri.to_string(),
                reason: "run has no artifact location".to_string(),
            });
        }

        let timeout = self.settings.collaborator_timeout;
        let exists = self
            .settings
            .retry
            .run("artifacts.exists", |_| {
                let artifacts = self.artifacts.clone();
                async move {
                    debug!(store = artifacts.name(), uri, "checking artifact");
                    with_timeout(timeout, "artifact store", artifacts.exists(uri)).await
                }
            })
            .await?;

        if exists {
            Ok(())
        } else {
            Err(RegistryError::ArtifactUnreachable {
                uri: uri.to_string(),
                reason: "artifact does not exist".to_string(),
            })
        }
    }
}
