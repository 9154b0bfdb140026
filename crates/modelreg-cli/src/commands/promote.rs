//! Gated promotion command

use clap::Args;
use modelreg_core::{Command, GateDecision, Outcome, PromotionOutcome, PromotionRequest};
use modelreg_types::{AliasName, ModelName, VersionNumber};

use super::{unexpected, Context};
use crate::error::CliResult;
use crate::output::{self, format_version, print_info, print_success, print_warning};

/// Move an alias to a version if it does not regress the primary metric
#[derive(Debug, Args)]
pub struct PromoteArgs {
    /// Registered model name
    #[arg(long)]
    model_name: ModelName,

    /// Candidate version; defaults to the latest
    #[arg(long)]
    version: Option<VersionNumber>,

    /// Alias to promote into
    #[arg(long, default_value = "champion")]
    to_alias: AliasName,

    /// Source alias, cleared once the promotion lands
    #[arg(long)]
    from_alias: Option<AliasName>,

    /// Skip the metric comparison
    #[arg(long)]
    force: bool,
}

impl PromoteArgs {
    fn into_request(self, actor: &str) -> PromotionRequest {
        let mut request = match self.version {
            Some(version) => PromotionRequest::new(self.model_name, version, actor),
            None => PromotionRequest::latest(self.model_name, actor),
        };
        request = request.to_alias(self.to_alias);
        if let Some(from) = self.from_alias {
            request = request.from_alias(from);
        }
        if self.force {
            request = request.forced();
        }
        request
    }
}

/// Execute the promote command
pub async fn execute(args: PromoteArgs, ctx: &Context) -> CliResult<()> {
    let request = args.into_request(&ctx.actor);
    let outcome = match ctx.dispatcher.dispatch(Command::Promote(request)).await? {
        Outcome::Promoted(outcome) => outcome,
        other => return Err(unexpected("promote", &other)),
    };

    if ctx.format.is_human() {
        report(&outcome);
        Ok(())
    } else {
        output::print_single(&outcome, ctx.format)
    }
}

fn report(outcome: &PromotionOutcome) {
    print_success(&format!(
        "Promoted {} v{} to {} (was {})",
        outcome.model_name,
        outcome.version,
        outcome.alias,
        format_version(outcome.previous)
    ));
    match &outcome.decision {
        GateDecision::Passed {
            metric,
            candidate,
            incumbent,
            improvement,
        } => println!(
            "  {}: {} vs {} (improvement {:+.4})",
            metric, candidate, incumbent, improvement
        ),
        GateDecision::Forced => print_warning("Metric comparison skipped (--force)"),
        GateDecision::IncumbentMissingMetric { metric, .. } => print_warning(&format!(
            "Previous holder had no '{}' metric; comparison skipped",
            metric
        )),
        GateDecision::AlreadyAssigned => print_info("Version already held the alias"),
        GateDecision::Unassigned | GateDecision::Rejected { .. } => {}
    }
    if let Some(cleared) = &outcome.cleared {
        print_info(&format!("Cleared {}@{}", outcome.model_name, cleared));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_latest() {
        let args = PromoteArgs {
            model_name: ModelName::new("churn").unwrap(),
            version: None,
            to_alias: AliasName::champion(),
            from_alias: Some(AliasName::staging()),
            force: true,
        };
        let request = args.into_request("ci");
        assert_eq!(request.version, None);
        assert_eq!(request.from_alias, Some(AliasName::staging()));
        assert!(request.force);
        assert_eq!(request.actor, "ci");
    }
}
