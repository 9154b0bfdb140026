//! Promotion policy configuration
//!
//! A policy names the primary metric used to compare a promotion candidate
//! against the version currently holding the target alias, the direction in
//! which that metric improves, and how strict the comparison is.

use crate::AliasName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Default primary metric when no policy is configured
pub const DEFAULT_PRIMARY_METRIC: &str = "f1_score";

/// Direction in which a metric improves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricGoal {
    /// Higher is better (accuracy, AUC, F1)
    #[default]
    Maximize,
    /// Lower is better (loss, RMSE)
    Minimize,
}

/// How a candidate's metric is compared with the incumbent's
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparison {
    /// Candidate must be at least as good as the incumbent
    #[default]
    NoRegression,
    /// Candidate must beat the incumbent by at least `threshold_value`
    Threshold,
}

/// Invalid policy configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyConfigError {
    #[error("policy for '{scope}' has an empty primary_metric")]
    EmptyMetric { scope: String },

    #[error("policy for '{scope}' uses threshold comparison without threshold_value")]
    MissingThreshold { scope: String },

    #[error("policy for '{scope}' has a non-finite threshold_value")]
    NonFiniteThreshold { scope: String },

    #[error("policy key '{0}' is not a valid alias name")]
    InvalidAlias(String),
}

/// Metric gate applied when promoting into an alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionPolicy {
    pub primary_metric: String,

    #[serde(default)]
    pub goal: MetricGoal,

    #[serde(default)]
    pub comparison: Comparison,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_value: Option<f64>,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self::no_regression(DEFAULT_PRIMARY_METRIC)
    }
}

impl PromotionPolicy {
    pub fn no_regression(metric: impl Into<String>) -> Self {
        Self {
            primary_metric: metric.into(),
            goal: MetricGoal::Maximize,
            comparison: Comparison::NoRegression,
            threshold_value: None,
        }
    }

    pub fn threshold(metric: impl Into<String>, min_improvement: f64) -> Self {
        Self {
            primary_metric: metric.into(),
            goal: MetricGoal::Maximize,
            comparison: Comparison::Threshold,
            threshold_value: Some(min_improvement),
        }
    }

    pub fn minimize(mut self) -> Self {
        self.goal = MetricGoal::Minimize;
        self
    }

    pub fn validate(&self, scope: &str) -> Result<(), PolicyConfigError> {
        if self.primary_metric.trim().is_empty() {
            return Err(PolicyConfigError::EmptyMetric {
                scope: scope.to_string(),
            });
        }
        match (self.comparison, self.threshold_value) {
            (Comparison::Threshold, None) => Err(PolicyConfigError::MissingThreshold {
                scope: scope.to_string(),
            }),
            (_, Some(v)) if !v.is_finite() => Err(PolicyConfigError::NonFiniteThreshold {
                scope: scope.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Signed improvement of `candidate` over `incumbent` in the goal
    /// direction; positive means the candidate is better.
    pub fn improvement(&self, candidate: f64, incumbent: f64) -> f64 {
        match self.goal {
            MetricGoal::Maximize => candidate - incumbent,
            MetricGoal::Minimize => incumbent - candidate,
        }
    }

    /// Whether `candidate` may replace `incumbent` under this policy.
    pub fn admits(&self, candidate: f64, incumbent: f64) -> bool {
        let delta = self.improvement(candidate, incumbent);
        match self.comparison {
            Comparison::NoRegression => delta >= 0.0,
            Comparison::Threshold => delta >= self.threshold_value.unwrap_or(0.0),
        }
    }
}

/// Policies per target alias, with a fallback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    #[serde(default)]
    pub default: PromotionPolicy,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, PromotionPolicy>,
}

impl PolicySet {
    pub fn new(default: PromotionPolicy) -> Self {
        Self {
            default,
            aliases: BTreeMap::new(),
        }
    }

    pub fn with_alias(mut self, alias: &AliasName, policy: PromotionPolicy) -> Self {
        self.aliases.insert(alias.to_string(), policy);
        self
    }

    pub fn for_alias(&self, alias: &AliasName) -> &PromotionPolicy {
        self.aliases.get(alias.as_str()).unwrap_or(&self.default)
    }

    pub fn validate(&self) -> Result<(), PolicyConfigError> {
        self.default.validate("default")?;
        for (alias, policy) in &self.aliases {
            AliasName::new(alias.as_str())
                .map_err(|_| PolicyConfigError::InvalidAlias(alias.clone()))?;
            policy.validate(alias)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_regression_allows_ties() {
        let policy = PromotionPolicy::no_regression("auc");
        assert!(policy.admits(0.85, 0.81));
        assert!(policy.admits(0.81, 0.81));
        assert!(!policy.admits(0.70, 0.85));
    }

    #[test]
    fn test_minimize_goal_flips_direction() {
        let policy = PromotionPolicy::no_regression("rmse").minimize();
        assert!(policy.admits(1.2, 1.5));
        assert!(!policy.admits(1.6, 1.5));
    }

    #[test]
    fn test_threshold_requires_margin() {
        let policy = PromotionPolicy::threshold("auc", 0.02);
        assert!(policy.admits(0.84, 0.81));
        assert!(!policy.admits(0.82, 0.81));

        let tolerant = PromotionPolicy::threshold("auc", -0.01);
        assert!(tolerant.admits(0.805, 0.81));
    }

    #[test]
    fn test_policy_validation() {
        let mut policy = PromotionPolicy::threshold("auc", 0.01);
        assert!(policy.validate("champion").is_ok());
        policy.threshold_value = None;
        assert!(matches!(
            policy.validate("champion"),
            Err(PolicyConfigError::MissingThreshold { .. })
        ));
        assert!(matches!(
            PromotionPolicy::no_regression(" ").validate("default"),
            Err(PolicyConfigError::EmptyMetric { .. })
        ));
    }

    #[test]
    fn test_policy_set_falls_back_to_default() {
        let set = PolicySet::new(PromotionPolicy::no_regression("f1_score"))
            .with_alias(&AliasName::champion(), PromotionPolicy::no_regression("auc"));
        assert_eq!(set.for_alias(&AliasName::champion()).primary_metric, "auc");
        assert_eq!(set.for_alias(&AliasName::staging()).primary_metric, "f1_score");
    }

    #[test]
    fn test_policy_set_rejects_reserved_alias_keys() {
        let mut set = PolicySet::default();
        set.aliases
            .insert("latest".into(), PromotionPolicy::no_regression("auc"));
        assert!(matches!(
            set.validate(),
            Err(PolicyConfigError::InvalidAlias(_))
        ));
    }

    #[test]
    fn test_policy_deserializes_kebab_case() {
        let json = r#"{"primary_metric":"rmse","goal":"minimize","comparison":"threshold","threshold_value":0.05}"#;
        let policy: PromotionPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.goal, MetricGoal::Minimize);
        assert_eq!(policy.comparison, Comparison::Threshold);
        assert_eq!(policy.threshold_value, Some(0.05));
    }
}
