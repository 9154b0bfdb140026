//! End-to-end tests of the `modelreg` binary against a file-backed registry

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Registry root, run manifests and artifacts inside one temp dir
struct Fixture {
    dir: TempDir,
    config: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("runs")).unwrap();
        fs::create_dir_all(root.join("artifacts")).unwrap();

        let config = root.join("config.toml");
        fs::write(
            &config,
            format!(
                r#"
[store]
type = "file"
root = '{root}/registry'

[tracker]
type = "directory"
path = '{root}/runs'

[retry]
max_attempts = 2
initial_delay_ms = 1
max_delay_ms = 5

[logging]
level = "warn"

[promotion.default]
primary_metric = "auc"
"#,
                root = root.display()
            ),
        )
        .unwrap();

        Self { dir, config }
    }

    /// Write a run manifest whose artifact exists on disk.
    fn add_run(&self, run: &str, auc: f64) {
        let artifact = self.dir.path().join("artifacts").join(run);
        fs::create_dir_all(&artifact).unwrap();
        self.write_manifest(
            run,
            json!({
                "artifact_uri": format!("file://{}", artifact.display()),
                "metrics": {"auc": auc},
            }),
        );
    }

    fn write_manifest(&self, run: &str, manifest: Value) {
        fs::write(
            self.dir.path().join("runs").join(format!("{}.json", run)),
            manifest.to_string(),
        )
        .unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("modelreg").unwrap();
        cmd.env_remove("MODELREG_CONFIG")
            .env_remove("MODELREG_ACTOR")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config)
            .arg("--actor")
            .arg("ci");
        cmd
    }

    /// Run a command with JSON output and parse stdout.
    fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(args)
            .args(["--output", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).unwrap()
    }

    fn register(&self, run: &str) -> Value {
        self.json(&["register", "--run-id", run, "--model-name", "churn"])
    }
}

#[test]
fn test_register_promote_and_reject() {
    let fx = Fixture::new();
    fx.add_run("r1", 0.81);
    fx.add_run("r2", 0.85);
    fx.add_run("r3", 0.70);

    let first = fx.register("r1");
    assert_eq!(first["version"]["version"], 1);
    assert_eq!(first["created"], true);
    assert_eq!(fx.register("r2")["version"]["version"], 2);

    fx.cmd()
        .args(["set-alias", "--model-name", "churn", "--version", "1", "--alias", "champion"])
        .assert()
        .success();

    let promoted = fx.json(&["promote", "--model-name", "churn", "--version", "2"]);
    assert_eq!(promoted["version"], 2);
    assert_eq!(promoted["previous"], 1);
    assert_eq!(promoted["decision"]["decision"], "passed");

    assert_eq!(fx.register("r3")["version"]["version"], 3);
    fx.cmd()
        .args(["promote", "--model-name", "churn", "--version", "3"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("rejected"));

    let info = fx.json(&["info", "--model-name", "churn"]);
    let numbers: Vec<u64> = info["versions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version"].as_u64().unwrap())
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(info["aliases"], json!({"champion": 2}));
}

#[test]
fn test_register_is_idempotent_per_run() {
    let fx = Fixture::new();
    fx.add_run("r1", 0.81);

    let first = fx.register("r1");
    let replay = fx.register("r1");
    assert_eq!(replay["version"]["version"], first["version"]["version"]);
    assert_eq!(replay["created"], false);

    let versions = fx.json(&["list", "--model-name", "churn"]);
    assert_eq!(versions.as_array().unwrap().len(), 1);
}

#[test]
fn test_register_freezes_description_and_tags() {
    let fx = Fixture::new();
    fx.add_run("r1", 0.81);

    let registered = fx.json(&[
        "register",
        "--run-id",
        "r1",
        "--model-name",
        "churn",
        "--description",
        "baseline",
        "--tag",
        "team=risk",
    ]);
    assert_eq!(registered["version"]["description"], "baseline");
    assert_eq!(registered["version"]["tags"], json!({"team": "risk"}));
    assert_eq!(registered["version"]["registered_by"], "ci");
    assert_eq!(registered["version"]["metrics"], json!({"auc": 0.81}));
}

#[test]
fn test_not_found_exits_2() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["info", "--model-name", "ghost"])
        .assert()
        .code(2);
    fx.cmd()
        .args(["register", "--run-id", "missing", "--model-name", "churn"])
        .assert()
        .code(2);

    fx.add_run("r1", 0.81);
    fx.register("r1");
    fx.cmd()
        .args(["resolve", "--model-name", "churn", "--alias", "champion"])
        .assert()
        .code(2);
    fx.cmd()
        .args(["set-alias", "--model-name", "churn", "--version", "9", "--alias", "staging"])
        .assert()
        .code(2);
}

#[test]
fn test_unreachable_artifact_exits_3_without_registering() {
    let fx = Fixture::new();
    fx.write_manifest(
        "r1",
        json!({
            "artifact_uri": format!("file://{}/nowhere", fx.dir.path().display()),
            "metrics": {"auc": 0.9},
        }),
    );

    fx.cmd()
        .args(["register", "--run-id", "r1", "--model-name", "churn"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Artifact unreachable"));

    let models = fx.json(&["list"]);
    assert_eq!(models, json!([]));
}

#[test]
fn test_usage_errors_exit_1() {
    let fx = Fixture::new();

    // Missing required flag
    fx.cmd().args(["info"]).assert().code(1);
    // Version numbers start at 1
    fx.cmd()
        .args(["set-alias", "--model-name", "churn", "--version", "0", "--alias", "champion"])
        .assert()
        .code(1);
    // Reserved alias name
    fx.cmd()
        .args(["set-alias", "--model-name", "churn", "--version", "1", "--alias", "latest"])
        .assert()
        .code(1);

    // Unfinished runs cannot be registered
    fx.write_manifest(
        "r1",
        json!({
            "artifact_uri": format!("file://{}", fx.dir.path().display()),
            "status": "running",
        }),
    );
    fx.cmd()
        .args(["register", "--run-id", "r1", "--model-name", "churn"])
        .assert()
        .code(1);
}

#[test]
fn test_rollback_and_history() {
    let fx = Fixture::new();
    fx.add_run("r1", 0.81);
    fx.add_run("r2", 0.85);
    fx.register("r1");
    fx.register("r2");

    fx.json(&["set-alias", "--model-name", "churn", "--version", "1", "--alias", "champion"]);
    fx.json(&["promote", "--model-name", "churn"]);

    let rolled_back = fx.json(&["rollback", "--model-name", "churn", "--alias", "champion"]);
    assert_eq!(rolled_back["version"], 1);
    assert_eq!(rolled_back["previous"], 2);

    let resolved = fx.json(&["resolve", "--model-name", "churn", "--alias", "champion"]);
    assert_eq!(resolved["version"], 1);

    let history = fx.json(&["history", "--model-name", "churn", "--alias", "champion"]);
    let reasons: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["reason"].as_str().unwrap())
        .collect();
    assert_eq!(reasons, vec!["set", "promote", "rollback"]);
    assert!(history
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e["actor"] == "ci"));

    fx.json(&["unset-alias", "--model-name", "churn", "--alias", "champion"]);
    fx.cmd()
        .args(["resolve", "--model-name", "churn", "--alias", "champion"])
        .assert()
        .code(2);
}

#[test]
fn test_table_output_lists_models() {
    let fx = Fixture::new();
    fx.add_run("r1", 0.81);
    fx.register("r1");

    fx.cmd()
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("churn").and(predicate::str::contains("v1")));
}

#[test]
fn test_table_output_lists_versions_with_aliases() {
    let fx = Fixture::new();
    fx.add_run("r1", 0.81);
    fx.add_run("r2", 0.85);
    fx.register("r1");
    fx.register("r2");
    fx.json(&["set-alias", "--model-name", "churn", "--version", "2", "--alias", "champion"]);

    fx.cmd()
        .args(["list", "--model-name", "churn"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("v1")
                .and(predicate::str::contains("v2"))
                .and(predicate::str::contains("champion"))
                .and(predicate::str::contains("auc=0.8500")),
        );
}

#[test]
fn test_config_shows_effective_settings() {
    let fx = Fixture::new();
    let config = fx.json(&["config"]);
    assert_eq!(config["store"]["type"], "file");
    assert_eq!(config["promotion"]["default"]["primary_metric"], "auc");
    assert_eq!(config["retry"]["max_attempts"], 2);
}
