//! Artifact store collaborators
//!
//! Registration only checks that a run's artifact can be reached; the
//! registry never reads or copies artifact contents.

use async_trait::async_trait;
use dashmap::DashSet;
use reqwest::{Client, StatusCode};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Artifact store errors
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact store unavailable: {0}")]
    Unavailable(String),

    #[error("No artifact store handles {0}")]
    UnsupportedScheme(String),
}

/// Existence checks for artifact URIs
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// `Ok(false)` means the store answered and the artifact is absent.
    async fn exists(&self, uri: &str) -> Result<bool, ArtifactError>;

    fn name(&self) -> &str;
}

/// Scheme of `uri`, lowercased; URIs without one are local paths.
fn scheme_of(uri: &str) -> String {
    match uri.split_once("://") {
        Some((scheme, _)) if !scheme.is_empty() => scheme.to_ascii_lowercase(),
        _ => "file".to_string(),
    }
}

/// Local filesystem (`file://` URIs and bare paths)
#[derive(Debug, Default)]
pub struct LocalArtifactStore;

impl LocalArtifactStore {
    fn path_of(uri: &str) -> PathBuf {
        PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn exists(&self, uri: &str) -> Result<bool, ArtifactError> {
        let path = Self::path_of(uri);
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ArtifactError::Unavailable(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// HTTP(S) artifact server probed with `HEAD`
pub struct HttpArtifactStore {
    client: Client,
}

impl HttpArtifactStore {
    pub fn new(timeout: Duration) -> Result<Self, ArtifactError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArtifactError::Unavailable(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn exists(&self, uri: &str) -> Result<bool, ArtifactError> {
        debug!(uri, "probing artifact");
        let response = self
            .client
            .head(uri)
            .send()
            .await
            .map_err(|e| ArtifactError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(ArtifactError::Unavailable(format!("HEAD {}: HTTP {}", uri, status)))
        } else {
            Ok(false)
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// In-memory artifact set for tests
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    uris: DashSet<String>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: impl Into<String>) {
        self.uris.insert(uri.into());
    }

    pub fn remove(&self, uri: &str) {
        self.uris.remove(uri);
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn exists(&self, uri: &str) -> Result<bool, ArtifactError> {
        Ok(self.uris.contains(uri))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Routes each URI to the store registered for its scheme
#[derive(Default)]
pub struct UriArtifactStore {
    routes: BTreeMap<String, Arc<dyn ArtifactStore>>,
    trusted: BTreeSet<String>,
}

impl UriArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local files always; HTTP(S) when `allow_http` is set.
    pub fn standard(allow_http: bool, timeout: Duration) -> Result<Self, ArtifactError> {
        let mut router = Self::new().route("file", Arc::new(LocalArtifactStore));
        if allow_http {
            let http: Arc<dyn ArtifactStore> = Arc::new(HttpArtifactStore::new(timeout)?);
            router = router.route("http", http.clone()).route("https", http);
        }
        Ok(router)
    }

    pub fn route(mut self, scheme: &str, store: Arc<dyn ArtifactStore>) -> Self {
        self.routes.insert(scheme.to_ascii_lowercase(), store);
        self
    }

    /// Accept URIs of `scheme` without probing them.
    pub fn trust(mut self, scheme: &str) -> Self {
        self.trusted.insert(scheme.to_ascii_lowercase());
        self
    }
}

#[async_trait]
impl ArtifactStore for UriArtifactStore {
    async fn exists(&self, uri: &str) -> Result<bool, ArtifactError> {
        let scheme = scheme_of(uri);
        if let Some(store) = self.routes.get(&scheme) {
            return store.exists(uri).await;
        }
        if self.trusted.contains(&scheme) {
            debug!(uri, %scheme, "scheme is trusted, skipping probe");
            return Ok(true);
        }
        Err(ArtifactError::UnsupportedScheme(uri.to_string()))
    }

    fn name(&self) -> &str {
        "router"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_detection() {
        assert_eq!(scheme_of("file:///tmp/x"), "file");
        assert_eq!(scheme_of("/tmp/x"), "file");
        assert_eq!(scheme_of("HTTPS://host/x"), "https");
        assert_eq!(scheme_of("s3://bucket/key"), "s3");
    }

    #[tokio::test]
    async fn test_local_store_checks_paths() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("model");
        std::fs::create_dir(&model_dir).unwrap();

        let store = LocalArtifactStore;
        let uri = format!("file://{}", model_dir.display());
        assert!(store.exists(&uri).await.unwrap());
        assert!(store.exists(&model_dir.display().to_string()).await.unwrap());
        assert!(!store
            .exists(&format!("file://{}/missing", dir.path().display()))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_router_dispatches_by_scheme() {
        let memory = Arc::new(InMemoryArtifactStore::new());
        memory.insert("mem://bucket/model");
        let router = UriArtifactStore::new()
            .route("mem", memory)
            .trust("s3");

        assert!(router.exists("mem://bucket/model").await.unwrap());
        assert!(!router.exists("mem://bucket/other").await.unwrap());
        assert!(router.exists("s3://bucket/model").await.unwrap());
        assert!(matches!(
            router.exists("gs://bucket/model").await,
            Err(ArtifactError::UnsupportedScheme(_))
        ));
    }
}
