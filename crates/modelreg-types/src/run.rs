//! Experiment run records
//!
//! A RunRecord is the registry's view of a finished (or unfinished) training
//! run, as reported by the experiment tracker.

use crate::{Metrics, RunId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a tracker run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Scheduled,
    Running,
    Finished,
    Failed,
    Killed,
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Finished)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Scheduled => "scheduled",
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
            RunStatus::Killed => "killed",
        };
        f.write_str(s)
    }
}

/// Case-insensitive, so tracker spellings like `FINISHED` parse too.
impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scheduled" => Ok(RunStatus::Scheduled),
            "running" => Ok(RunStatus::Running),
            "finished" => Ok(RunStatus::Finished),
            "failed" => Ok(RunStatus::Failed),
            "killed" => Ok(RunStatus::Killed),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}

/// Run metadata fetched from the experiment tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,

    /// Location of the trained model artifact
    pub artifact_uri: String,

    /// Evaluation metrics logged for the run
    #[serde(default)]
    pub metrics: Metrics,

    pub status: RunStatus,
}

impl RunRecord {
    pub fn finished(run_id: RunId, artifact_uri: impl Into<String>, metrics: Metrics) -> Self {
        Self {
            run_id,
            artifact_uri: artifact_uri.into(),
            metrics,
            status: RunStatus::Finished,
        }
    }
}
