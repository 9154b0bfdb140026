//! Promotion gate
//!
//! Decides whether a candidate version may take over an alias from its
//! current holder, given the policy configured for that alias.

use modelreg_types::{Comparison, ModelVersion, PromotionPolicy, VersionNumber};
use serde::Serialize;
use tracing::warn;

/// Outcome of evaluating a promotion against a policy
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum GateDecision {
    /// Alias was unassigned; nothing to compare against
    Unassigned,

    /// Candidate already holds the alias
    AlreadyAssigned,

    /// Comparison bypassed by the caller
    Forced,

    /// Candidate met the policy
    Passed {
        metric: String,
        candidate: f64,
        incumbent: f64,
        improvement: f64,
    },

    /// Incumbent has no value for the metric, so nothing can regress
    IncumbentMissingMetric { metric: String, candidate: f64 },

    /// Candidate failed the policy
    Rejected { reason: String },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, GateDecision::Rejected { .. })
    }
}

/// Evaluate `candidate` against the current holder of an alias.
pub fn evaluate(
    policy: &PromotionPolicy,
    candidate: &ModelVersion,
    incumbent: Option<&ModelVersion>,
    force: bool,
) -> GateDecision {
    let Some(incumbent) = incumbent else {
        return GateDecision::Unassigned;
    };
    if incumbent.version == candidate.version {
        return GateDecision::AlreadyAssigned;
    }
    if force {
        return GateDecision::Forced;
    }

    let metric = policy.primary_metric.as_str();
    let Some(candidate_value) = candidate.metric(metric) else {
        return GateDecision::Rejected {
            reason: format!("v{} has no '{}' metric", candidate.version, metric),
        };
    };
    let Some(incumbent_value) = incumbent.metric(metric) else {
        warn!(
            model = %candidate.model_name,
            incumbent = %incumbent.version,
            metric,
            "incumbent has no value for the primary metric, allowing promotion"
        );
        return GateDecision::IncumbentMissingMetric {
            metric: metric.to_string(),
            candidate: candidate_value,
        };
    };

    let improvement = policy.improvement(candidate_value, incumbent_value);
    if policy.admits(candidate_value, incumbent_value) {
        GateDecision::Passed {
            metric: metric.to_string(),
            candidate: candidate_value,
            incumbent: incumbent_value,
            improvement,
        }
    } else {
        GateDecision::Rejected {
            reason: rejection_reason(
                policy,
                candidate.version,
                incumbent.version,
                candidate_value,
                incumbent_value,
            ),
        }
    }
}

fn rejection_reason(
    policy: &PromotionPolicy,
    candidate: VersionNumber,
    incumbent: VersionNumber,
    candidate_value: f64,
    incumbent_value: f64,
) -> String {
    let metric = &policy.primary_metric;
    match policy.threshold_value {
        Some(threshold) if policy.comparison == Comparison::Threshold => format!(
            "{} of v{} ({}) does not beat v{} ({}) by the required {} ({:?})",
            metric, candidate, candidate_value, incumbent, incumbent_value, threshold, policy.goal
        ),
        _ => format!(
            "{} of v{} ({}) regresses from v{} ({}) ({:?})",
            metric, candidate, candidate_value, incumbent, incumbent_value, policy.goal
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use modelreg_types::{ModelName, NewModelVersion, RunId};

    fn version(n: u64, auc: Option<f64>) -> ModelVersion {
        let mut draft = NewModelVersion::new(
            ModelName::new("churn").unwrap(),
            RunId::new(format!("r{}", n)).unwrap(),
            format!("file:///m/{}", n),
        );
        if let Some(auc) = auc {
            draft = draft.with_metric("auc", auc);
        }
        draft.into_version(VersionNumber::new(n).unwrap(), Utc::now())
    }

    #[test]
    fn test_no_incumbent_is_unconditional() {
        let policy = PromotionPolicy::no_regression("auc");
        let decision = evaluate(&policy, &version(1, None), None, false);
        assert_eq!(decision, GateDecision::Unassigned);
    }

    #[test]
    fn test_regression_is_rejected_unless_forced() {
        let policy = PromotionPolicy::no_regression("auc");
        let champion = version(2, Some(0.85));
        let worse = version(3, Some(0.70));

        let decision = evaluate(&policy, &worse, Some(&champion), false);
        assert!(!decision.is_allowed());

        let decision = evaluate(&policy, &worse, Some(&champion), true);
        assert_eq!(decision, GateDecision::Forced);
    }

    #[test]
    fn test_improvement_passes() {
        let policy = PromotionPolicy::no_regression("auc");
        let decision = evaluate(&policy, &version(2, Some(0.85)), Some(&version(1, Some(0.81))), false);
        match decision {
            GateDecision::Passed { improvement, .. } => assert!((improvement - 0.04).abs() < 1e-9),
            other => panic!("expected pass, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_metrics() {
        let policy = PromotionPolicy::no_regression("auc");
        let decision = evaluate(&policy, &version(2, None), Some(&version(1, Some(0.81))), false);
        assert!(!decision.is_allowed());

        let decision = evaluate(&policy, &version(2, Some(0.5)), Some(&version(1, None)), false);
        assert!(matches!(decision, GateDecision::IncumbentMissingMetric { .. }));
    }

    #[test]
    fn test_same_version_is_already_assigned() {
        let policy = PromotionPolicy::threshold("auc", 0.05);
        let v = version(1, Some(0.8));
        assert_eq!(evaluate(&policy, &v, Some(&v), false), GateDecision::AlreadyAssigned);
    }
}
