//! Model registration command

use clap::Args;
use modelreg_core::{Command, Outcome, Registration, RegistrationRequest};
use modelreg_types::{ModelName, RunId};

use super::{unexpected, Context};
use crate::error::CliResult;
use crate::output::{self, print_info, print_success};

/// Register a finished run as a new model version
#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Experiment tracker run ID
    #[arg(long)]
    run_id: RunId,

    /// Registered model name
    #[arg(long)]
    model_name: ModelName,

    /// Version description
    #[arg(long)]
    description: Option<String>,

    /// Version tag as key=value (repeatable)
    #[arg(long = "tag", value_parser = parse_tag)]
    tags: Vec<(String, String)>,
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

/// Execute the register command
pub async fn execute(args: RegisterArgs, ctx: &Context) -> CliResult<()> {
    let mut request =
        RegistrationRequest::new(args.run_id, args.model_name).with_actor(ctx.actor.as_str());
    if let Some(description) = args.description {
        request = request.with_description(description);
    }
    for (key, value) in args.tags {
        request = request.with_tag(key, value);
    }

    let registration = match ctx.dispatcher.dispatch(Command::Register(request)).await? {
        Outcome::Registered(registration) => registration,
        other => return Err(unexpected("register", &other)),
    };

    if ctx.format.is_human() {
        report(&registration);
        Ok(())
    } else {
        output::print_single(&registration, ctx.format)
    }
}

fn report(registration: &Registration) {
    let version = &registration.version;
    if registration.created {
        print_success(&format!(
            "Registered {} v{} from run {}",
            version.model_name, version.version, version.source_run_id
        ));
    } else {
        print_info(&format!(
            "Run {} is already registered as {} v{}",
            version.source_run_id, version.model_name, version.version
        ));
    }
    println!("  Artifact: {}", version.artifact_uri);
    for (name, value) in &version.metrics {
        println!("  {}: {}", name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag() {
        assert_eq!(
            parse_tag("team=risk").unwrap(),
            ("team".to_string(), "risk".to_string())
        );
        assert_eq!(
            parse_tag("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_tag("novalue").is_err());
        assert!(parse_tag("=x").is_err());
    }
}
