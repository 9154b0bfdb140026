//! Configuration for the registry
//!
//! Layered the usual way: built-in defaults, then a TOML file, then
//! `MODELREG__SECTION__KEY` environment overrides.

use crate::artifact::{ArtifactStore, UriArtifactStore};
use crate::error::{RegistryError, Result};
use crate::registration::RegistrationSettings;
use crate::retry::RetryPolicy;
use crate::tracker::{DirectoryTracker, ExperimentTracker, MlflowTracker};
use modelreg_store::{FileRegistryStore, InMemoryRegistryStore, LockOptions, RegistryStore};
use modelreg_types::PolicySet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "MODELREG_CONFIG";

/// Prefix of per-key environment overrides
pub const ENV_PREFIX: &str = "MODELREG";

/// Main registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    #[serde(default)]
    pub collaborators: CollaboratorConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Promotion policies per target alias
    #[serde(default)]
    pub promotion: PolicySet,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Registry store backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-memory storage (lost when the process exits)
    Memory,

    /// JSON documents under `root`
    File {
        root: PathBuf,

        #[serde(default)]
        lock_retry: LockRetryConfig,

        /// Lock files older than this are broken; 0 never breaks locks
        #[serde(default = "default_stale_lock_secs")]
        stale_lock_secs: u64,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            root: default_store_root(),
            lock_retry: LockRetryConfig::default(),
            stale_lock_secs: default_stale_lock_secs(),
        }
    }
}

/// Lock acquisition backoff for the file store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRetryConfig {
    #[serde(default = "default_lock_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_lock_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_lock_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for LockRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_lock_attempts(),
            initial_delay_ms: default_lock_initial_delay(),
            max_delay_ms: default_lock_max_delay(),
        }
    }
}

/// Experiment tracker backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TrackerConfig {
    /// Directory of `<run_id>.json` manifests
    Directory { path: PathBuf },

    /// MLflow-compatible tracking server
    Mlflow {
        endpoint: String,

        /// Path of the logged model inside the run's artifact root
        #[serde(default = "default_artifact_path")]
        artifact_path: String,
    },
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig::Directory {
            path: PathBuf::from("runs"),
        }
    }
}

/// Artifact store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Probe `http://` and `https://` artifacts with HEAD requests
    #[serde(default = "default_true")]
    pub allow_http: bool,

    /// Schemes accepted without probing (e.g. `s3`)
    #[serde(default)]
    pub trusted_schemes: Vec<String>,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            allow_http: true,
            trusted_schemes: Vec::new(),
        }
    }
}

/// External collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    /// Bound on each tracker or artifact call (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl CollaboratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Registration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default = "default_true")]
    pub require_finished_run: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            require_finished_run: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_store_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("modelreg"))
        .unwrap_or_else(|| PathBuf::from(".modelreg"))
}

fn default_stale_lock_secs() -> u64 {
    30
}

fn default_lock_attempts() -> u32 {
    50
}

fn default_lock_initial_delay() -> u64 {
    5
}

fn default_lock_max_delay() -> u64 {
    200
}

fn default_artifact_path() -> String {
    "model".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `<config_dir>/modelreg/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("modelreg").join("config.toml"))
}

impl RegistryConfig {
    /// Load configuration.
    ///
    /// An explicit `path` (or `MODELREG_CONFIG`) must exist; the default
    /// location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&RegistryConfig::default())?);

        // Add file configuration
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match explicit {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(path) = default_config_path() {
                    builder = builder.add_source(config::File::from(path).required(false));
                }
            }
        }

        // Add environment variables with MODELREG__ prefix
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: RegistryConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        self.promotion.validate()?;
        if self.collaborators.timeout_ms == 0 {
            return Err(RegistryError::Config(
                "collaborators.timeout_ms must be positive".to_string(),
            ));
        }
        if let StoreConfig::File { lock_retry, .. } = &self.store {
            if lock_retry.max_attempts == 0 {
                return Err(RegistryError::Config(
                    "store.lock_retry.max_attempts must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn registration_settings(&self) -> RegistrationSettings {
        RegistrationSettings {
            require_finished_run: self.registration.require_finished_run,
            collaborator_timeout: self.collaborators.timeout(),
            retry: self.retry.clone(),
        }
    }

    pub async fn build_store(&self) -> Result<Arc<dyn RegistryStore>> {
        match &self.store {
            StoreConfig::Memory => Ok(Arc::new(InMemoryRegistryStore::new())),
            StoreConfig::File {
                root,
                lock_retry,
                stale_lock_secs,
            } => {
                let options = LockOptions {
                    max_attempts: lock_retry.max_attempts,
                    initial_delay: Duration::from_millis(lock_retry.initial_delay_ms),
                    max_delay: Duration::from_millis(lock_retry.max_delay_ms),
                    stale_after: (*stale_lock_secs > 0)
                        .then(|| Duration::from_secs(*stale_lock_secs)),
                };
                let store = FileRegistryStore::open_with_options(root, options)
                    .await
                    .map_err(|e| {
                        RegistryError::BackendUnavailable(format!(
                            "cannot open store at {}: {}",
                            root.display(),
                            e
                        ))
                    })?;
                Ok(Arc::new(store))
            }
        }
    }

    pub fn build_tracker(&self) -> Result<Arc<dyn ExperimentTracker>> {
        match &self.tracker {
            TrackerConfig::Directory { path } => Ok(Arc::new(DirectoryTracker::new(path))),
            TrackerConfig::Mlflow {
                endpoint,
                artifact_path,
            } => {
                let tracker =
                    MlflowTracker::new(endpoint, artifact_path.clone(), self.collaborators.timeout())?;
                Ok(Arc::new(tracker))
            }
        }
    }

    pub fn build_artifacts(&self) -> Result<Arc<dyn ArtifactStore>> {
        let mut router =
            UriArtifactStore::standard(self.artifacts.allow_http, self.collaborators.timeout())?;
        for scheme in &self.artifacts.trusted_schemes {
            router = router.trust(scheme);
        }
        Ok(Arc::new(router))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelreg_types::{AliasName, MetricGoal};

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert!(matches!(config.store, StoreConfig::File { .. }));
        assert!(matches!(config.tracker, TrackerConfig::Directory { .. }));
        assert!(config.registration.require_finished_run);
        assert_eq!(config.promotion.default.primary_metric, "f1_score");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelreg.toml");
        std::fs::write(
            &path,
            r#"
[store]
type = "memory"

[tracker]
type = "mlflow"
endpoint = "http://mlflow:5000"

[collaborators]
timeout_ms = 2500

[promotion.default]
primary_metric = "auc"

[promotion.aliases.production]
primary_metric = "rmse"
goal = "minimize"
comparison = "threshold"
threshold_value = 0.01
"#,
        )
        .unwrap();

        let config = RegistryConfig::load(Some(path.as_path())).unwrap();
        assert!(matches!(config.store, StoreConfig::Memory));
        match &config.tracker {
            TrackerConfig::Mlflow {
                endpoint,
                artifact_path,
            } => {
                assert_eq!(endpoint, "http://mlflow:5000");
                assert_eq!(artifact_path, "model");
            }
            other => panic!("unexpected tracker {:?}", other),
        }
        assert_eq!(config.collaborators.timeout_ms, 2500);
        assert_eq!(config.retry, RetryPolicy::default());

        let production = config.promotion.for_alias(&AliasName::production());
        assert_eq!(production.primary_metric, "rmse");
        assert_eq!(production.goal, MetricGoal::Minimize);
        assert_eq!(
            config.promotion.for_alias(&AliasName::champion()).primary_metric,
            "auc"
        );
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelreg.toml");
        std::fs::write(
            &path,
            r#"
[promotion.default]
primary_metric = "auc"
comparison = "threshold"
"#,
        )
        .unwrap();

        assert!(matches!(
            RegistryConfig::load(Some(path.as_path())),
            Err(RegistryError::Config(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(RegistryConfig::load(Some(missing.as_path())).is_err());
    }
}
