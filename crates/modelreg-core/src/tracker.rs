//! Experiment tracker collaborators
//!
//! The registry only needs one thing from a tracker: the artifact location,
//! metrics and status of a finished run.

use async_trait::async_trait;
use dashmap::DashMap;
use modelreg_types::{Metrics, RunId, RunRecord, RunStatus};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Tracker errors
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Tracker unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid tracker response: {0}")]
    InvalidResponse(String),
}

/// Source of run metadata
#[async_trait]
pub trait ExperimentTracker: Send + Sync {
    async fn get_run(&self, run_id: &RunId) -> Result<RunRecord, TrackerError>;

    /// Tracker name for logs
    fn name(&self) -> &str;
}

/// In-memory tracker for tests and embedding
#[derive(Default)]
pub struct InMemoryTracker {
    runs: DashMap<RunId, RunRecord>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, run: RunRecord) {
        self.runs.insert(run.run_id.clone(), run);
    }

    pub fn with_run(self, run: RunRecord) -> Self {
        self.insert(run);
        self
    }
}

#[async_trait]
impl ExperimentTracker for InMemoryTracker {
    async fn get_run(&self, run_id: &RunId) -> Result<RunRecord, TrackerError> {
        self.runs
            .get(run_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| TrackerError::RunNotFound(run_id.clone()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Run manifest as written by a training job
#[derive(Debug, Deserialize)]
struct RunManifest {
    #[serde(default)]
    run_id: Option<RunId>,
    artifact_uri: String,
    #[serde(default)]
    metrics: Metrics,
    #[serde(default = "default_manifest_status")]
    status: RunStatus,
}

fn default_manifest_status() -> RunStatus {
    RunStatus::Finished
}

/// Tracker backed by a directory of `<run_id>.json` manifests
pub struct DirectoryTracker {
    root: PathBuf,
}

impl DirectoryTracker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ExperimentTracker for DirectoryTracker {
    async fn get_run(&self, run_id: &RunId) -> Result<RunRecord, TrackerError> {
        let path = self.root.join(format!("{}.json", run_id));
        debug!(path = %path.display(), "reading run manifest");

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TrackerError::RunNotFound(run_id.clone()))
            }
            Err(e) => {
                return Err(TrackerError::Unavailable(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let manifest: RunManifest = serde_json::from_slice(&bytes)
            .map_err(|e| TrackerError::InvalidResponse(format!("{}: {}", path.display(), e)))?;

        if let Some(recorded) = &manifest.run_id {
            if recorded != run_id {
                return Err(TrackerError::InvalidResponse(format!(
                    "{} describes run {}",
                    path.display(),
                    recorded
                )));
            }
        }

        Ok(RunRecord {
            run_id: run_id.clone(),
            artifact_uri: manifest.artifact_uri,
            metrics: manifest.metrics,
            status: manifest.status,
        })
    }

    fn name(&self) -> &str {
        "directory"
    }
}

/// MLflow-compatible REST tracker
pub struct MlflowTracker {
    client: Client,
    base_url: String,
    artifact_path: String,
}

#[derive(Debug, Deserialize)]
struct GetRunResponse {
    run: MlflowRun,
}

#[derive(Debug, Deserialize)]
struct MlflowRun {
    info: MlflowRunInfo,
    #[serde(default)]
    data: MlflowRunData,
}

#[derive(Debug, Deserialize)]
struct MlflowRunInfo {
    status: String,
    artifact_uri: String,
}

#[derive(Debug, Default, Deserialize)]
struct MlflowRunData {
    #[serde(default)]
    metrics: Vec<MlflowMetric>,
}

#[derive(Debug, Deserialize)]
struct MlflowMetric {
    key: String,
    value: f64,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    step: i64,
}

#[derive(Debug, Default, Deserialize)]
struct MlflowErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

impl MlflowTracker {
    /// Create a tracker for the server at `endpoint`.
    ///
    /// `artifact_path` is the path of the logged model inside the run's
    /// artifact root; an empty path uses the root itself.
    pub fn new(
        endpoint: &str,
        artifact_path: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            artifact_path: artifact_path.into(),
        })
    }

    fn model_uri(&self, artifact_root: &str) -> String {
        let path = self.artifact_path.trim_matches('/');
        if path.is_empty() {
            artifact_root.to_string()
        } else {
            format!("{}/{}", artifact_root.trim_end_matches('/'), path)
        }
    }
}

/// Latest value per metric key, ordered by step then timestamp.
fn latest_metrics(history: Vec<MlflowMetric>) -> Metrics {
    let mut latest: HashMap<String, (i64, i64, f64)> = HashMap::new();
    for m in history {
        let entry = latest.entry(m.key).or_insert((m.step, m.timestamp, m.value));
        if (m.step, m.timestamp) >= (entry.0, entry.1) {
            *entry = (m.step, m.timestamp, m.value);
        }
    }
    latest.into_iter().map(|(k, (_, _, v))| (k, v)).collect()
}

#[async_trait]
impl ExperimentTracker for MlflowTracker {
    async fn get_run(&self, run_id: &RunId) -> Result<RunRecord, TrackerError> {
        let url = format!("{}/api/2.0/mlflow/runs/get", self.base_url);
        debug!(%url, run_id = %run_id, "fetching run from tracking server");

        let response = self
            .client
            .get(&url)
            .query(&[("run_id", run_id.as_str())])
            .send()
            .await
            .map_err(|e| TrackerError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: MlflowErrorBody = response.json().await.unwrap_or_default();
            if status == StatusCode::NOT_FOUND || body.error_code == "RESOURCE_DOES_NOT_EXIST" {
                return Err(TrackerError::RunNotFound(run_id.clone()));
            }
            let detail = format!("HTTP {}: {} {}", status, body.error_code, body.message);
            return Err(if status.is_server_error() {
                TrackerError::Unavailable(detail)
            } else {
                TrackerError::InvalidResponse(detail)
            });
        }

        let body: GetRunResponse = response
            .json()
            .await
            .map_err(|e| TrackerError::InvalidResponse(e.to_string()))?;
        let status = body
            .run
            .info
            .status
            .parse::<RunStatus>()
            .map_err(TrackerError::InvalidResponse)?;

        Ok(RunRecord {
            run_id: run_id.clone(),
            artifact_uri: self.model_uri(&body.run.info.artifact_uri),
            metrics: latest_metrics(body.run.data.metrics),
            status,
        })
    }

    fn name(&self) -> &str {
        "mlflow"
    }
}
