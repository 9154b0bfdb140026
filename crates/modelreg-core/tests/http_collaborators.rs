//! MLflow tracker and HTTP artifact store against a mock server

use modelreg_core::{
    ArtifactStore, ExperimentTracker, HttpArtifactStore, MlflowTracker, TrackerError,
};
use modelreg_types::{RunId, RunStatus};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn run_id(s: &str) -> RunId {
    RunId::new(s).unwrap()
}

#[tokio::test]
async fn test_mlflow_run_is_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/mlflow/runs/get"))
        .and(query_param("run_id", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "run": {
                "info": {
                    "run_id": "abc123",
                    "status": "FINISHED",
                    "artifact_uri": "mlflow-artifacts:/1/abc123/artifacts"
                },
                "data": {
                    "metrics": [
                        {"key": "auc", "value": 0.79, "timestamp": 100, "step": 0},
                        {"key": "auc", "value": 0.83, "timestamp": 200, "step": 1},
                        {"key": "f1_score", "value": 0.61, "timestamp": 200, "step": 0}
                    ],
                    "params": [{"key": "max_depth", "value": "6"}]
                }
            }
        })))
        .mount(&server)
        .await;

    let tracker = MlflowTracker::new(&server.uri(), "xgboost_churn", Duration::from_secs(5)).unwrap();
    let run = tracker.get_run(&run_id("abc123")).await.unwrap();

    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(
        run.artifact_uri,
        "mlflow-artifacts:/1/abc123/artifacts/xgboost_churn"
    );
    assert_eq!(run.metrics.get("auc"), Some(&0.83));
    assert_eq!(run.metrics.get("f1_score"), Some(&0.61));
}

#[tokio::test]
async fn test_mlflow_missing_run_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/mlflow/runs/get"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error_code": "RESOURCE_DOES_NOT_EXIST",
            "message": "Run 'ghost' not found"
        })))
        .mount(&server)
        .await;

    let tracker = MlflowTracker::new(&server.uri(), "model", Duration::from_secs(5)).unwrap();
    assert!(matches!(
        tracker.get_run(&run_id("ghost")).await,
        Err(TrackerError::RunNotFound(_))
    ));
}

#[tokio::test]
async fn test_mlflow_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/mlflow/runs/get"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let tracker = MlflowTracker::new(&server.uri(), "model", Duration::from_secs(5)).unwrap();
    assert!(matches!(
        tracker.get_run(&run_id("abc")).await,
        Err(TrackerError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_mlflow_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/mlflow/runs/get"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let tracker = MlflowTracker::new(&server.uri(), "model", Duration::from_millis(100)).unwrap();
    assert!(matches!(
        tracker.get_run(&run_id("abc")).await,
        Err(TrackerError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_http_artifact_probe() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/models/churn/model.pkl"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/models/flaky/model.pkl"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let store = HttpArtifactStore::new(Duration::from_secs(5)).unwrap();
    let base = server.uri();
    assert!(store
        .exists(&format!("{}/models/churn/model.pkl", base))
        .await
        .unwrap());
    // Unmatched requests get wiremock's default 404.
    assert!(!store
        .exists(&format!("{}/models/missing/model.pkl", base))
        .await
        .unwrap());
    assert!(store
        .exists(&format!("{}/models/flaky/model.pkl", base))
        .await
        .is_err());
}
