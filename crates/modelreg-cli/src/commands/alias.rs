//! Alias commands: set, unset and rollback

use clap::Args;
use modelreg_core::{AliasUpdate, Command, Outcome};
use modelreg_types::{AliasName, ModelName, VersionNumber};

use super::{unexpected, Context};
use crate::error::CliResult;
use crate::output::{self, format_version, print_success};

/// Point an alias at a version (no policy check)
#[derive(Debug, Args)]
pub struct SetAliasArgs {
    /// Registered model name
    #[arg(long)]
    model_name: ModelName,

    /// Version number (`3` or `v3`)
    #[arg(long)]
    version: VersionNumber,

    /// Alias name
    #[arg(long)]
    alias: AliasName,
}

/// Remove an alias
#[derive(Debug, Args)]
pub struct UnsetAliasArgs {
    /// Registered model name
    #[arg(long)]
    model_name: ModelName,

    /// Alias name
    #[arg(long)]
    alias: AliasName,
}

/// Restore an alias to the version it held before its last change
#[derive(Debug, Args)]
pub struct RollbackArgs {
    /// Registered model name
    #[arg(long)]
    model_name: ModelName,

    /// Alias name
    #[arg(long, default_value = "champion")]
    alias: AliasName,
}

pub async fn set(args: SetAliasArgs, ctx: &Context) -> CliResult<()> {
    let command = Command::SetAlias {
        model: args.model_name,
        alias: args.alias,
        version: args.version,
        actor: ctx.actor.clone(),
    };
    run("set-alias", command, ctx).await
}

pub async fn unset(args: UnsetAliasArgs, ctx: &Context) -> CliResult<()> {
    let command = Command::UnsetAlias {
        model: args.model_name,
        alias: args.alias,
        actor: ctx.actor.clone(),
    };
    run("unset-alias", command, ctx).await
}

pub async fn rollback(args: RollbackArgs, ctx: &Context) -> CliResult<()> {
    let command = Command::Rollback {
        model: args.model_name,
        alias: args.alias,
        actor: ctx.actor.clone(),
    };
    run("rollback", command, ctx).await
}

async fn run(name: &str, command: Command, ctx: &Context) -> CliResult<()> {
    let update = match ctx.dispatcher.dispatch(command).await? {
        Outcome::AliasUpdated(update) => update,
        other => return Err(unexpected(name, &other)),
    };
    if ctx.format.is_human() {
        print_success(&describe(&update));
        Ok(())
    } else {
        output::print_single(&update, ctx.format)
    }
}

fn describe(update: &AliasUpdate) -> String {
    match update.version {
        Some(version) => format!(
            "{}@{} -> v{} (was {})",
            update.model_name,
            update.alias,
            version,
            format_version(update.previous)
        ),
        None => format!(
            "{}@{} unset (was {})",
            update.model_name,
            update.alias,
            format_version(update.previous)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_update() {
        let update = AliasUpdate {
            model_name: ModelName::new("churn").unwrap(),
            alias: AliasName::champion(),
            version: VersionNumber::new(2),
            previous: None,
        };
        assert_eq!(describe(&update), "churn@champion -> v2 (was -)");

        let cleared = AliasUpdate {
            version: None,
            previous: VersionNumber::new(2),
            ..update
        };
        assert_eq!(describe(&cleared), "churn@champion unset (was v2)");
    }
}
