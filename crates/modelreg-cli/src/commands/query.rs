//! Read-only commands: list, info, history and resolve

use clap::Args;
use modelreg_core::{Command, ModelInfo, ModelSummary, Outcome};
use modelreg_types::{
    AliasChangeLogEntry, AliasName, ModelName, ModelVersion, VersionNumber, VersionSelector,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

use super::{unexpected, Context};
use crate::error::CliResult;
use crate::output::{self, format_aliases, format_version, humanize_duration};

/// List models, or the versions of one model
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Registered model name
    #[arg(long)]
    model_name: Option<ModelName>,
}

/// Show a model with all its versions and aliases
#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Registered model name
    #[arg(long)]
    model_name: ModelName,
}

/// Show the alias change log
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Registered model name
    #[arg(long)]
    model_name: ModelName,

    /// Only changes to this alias
    #[arg(long)]
    alias: Option<AliasName>,
}

/// Resolve a version number, an alias, or the latest version
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Registered model name
    #[arg(long)]
    model_name: ModelName,

    /// Version number
    #[arg(long, conflicts_with = "alias")]
    version: Option<VersionNumber>,

    /// Alias name
    #[arg(long)]
    alias: Option<AliasName>,
}

impl ResolveArgs {
    fn selector(&self) -> VersionSelector {
        match (self.version, &self.alias) {
            (Some(version), _) => VersionSelector::Number(version),
            (None, Some(alias)) => VersionSelector::Alias(alias.clone()),
            (None, None) => VersionSelector::Latest,
        }
    }
}

/// Table row for model display
#[derive(Debug, Serialize, Tabled)]
struct ModelRow {
    /// Model name
    name: String,
    /// Latest version
    latest: String,
    /// Number of versions
    versions: usize,
    /// Alias assignments
    aliases: String,
    /// Time since the last change
    updated: String,
}

impl From<ModelSummary> for ModelRow {
    fn from(m: ModelSummary) -> Self {
        Self {
            name: m.name.to_string(),
            latest: format!("v{}", m.latest_version),
            versions: m.version_count,
            aliases: format_aliases(&m.aliases),
            updated: humanize_duration(chrono::Utc::now() - m.updated_at),
        }
    }
}

/// Table row for version display
#[derive(Debug, Serialize, Tabled)]
struct VersionRow {
    /// Version number
    version: String,
    /// Source run
    run: String,
    /// Frozen metrics
    metrics: String,
    /// Aliases pointing at this version
    aliases: String,
    /// Age
    age: String,
}

impl VersionRow {
    fn new(v: &ModelVersion, aliases: &BTreeMap<AliasName, VersionNumber>) -> Self {
        let held: Vec<&str> = aliases
            .iter()
            .filter(|(_, target)| **target == v.version)
            .map(|(alias, _)| alias.as_str())
            .collect();
        Self {
            version: format!("v{}", v.version),
            run: v.source_run_id.to_string(),
            metrics: format_metrics(v),
            aliases: if held.is_empty() {
                "-".to_string()
            } else {
                held.join(", ")
            },
            age: humanize_duration(chrono::Utc::now() - v.created_at),
        }
    }
}

/// Table row for alias history display
#[derive(Debug, Serialize, Tabled)]
struct HistoryRow {
    /// When the change happened
    time: String,
    /// Alias name
    alias: String,
    /// Previous target
    from: String,
    /// New target
    to: String,
    /// Change reason
    reason: String,
    /// Who made the change
    actor: String,
}

impl From<AliasChangeLogEntry> for HistoryRow {
    fn from(e: AliasChangeLogEntry) -> Self {
        Self {
            time: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            alias: e.alias_name.to_string(),
            from: format_version(e.old_version),
            to: format_version(e.new_version),
            reason: e.reason.to_string(),
            actor: e.actor,
        }
    }
}

fn format_metrics(v: &ModelVersion) -> String {
    if v.metrics.is_empty() {
        return "-".to_string();
    }
    v.metrics
        .iter()
        .map(|(name, value)| format!("{}={:.4}", name, value))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn list(args: ListArgs, ctx: &Context) -> CliResult<()> {
    match (args.model_name, ctx.format.is_human()) {
        (None, human) => match ctx.dispatcher.dispatch(Command::List { model: None }).await? {
            Outcome::Models(models) if human => {
                output::print_output(models.into_iter().map(ModelRow::from).collect(), ctx.format)
            }
            Outcome::Models(models) => output::print_single(&models, ctx.format),
            other => Err(unexpected("list", &other)),
        },
        // Alias columns and versions come from one snapshot.
        (Some(model), true) => {
            let info = info_of(model, ctx).await?;
            output::print_output(version_rows(&info), ctx.format)
        }
        (Some(model), false) => {
            match ctx
                .dispatcher
                .dispatch(Command::List { model: Some(model) })
                .await?
            {
                Outcome::Versions(versions) => output::print_single(&versions, ctx.format),
                other => Err(unexpected("list", &other)),
            }
        }
    }
}

fn version_rows(info: &ModelInfo) -> Vec<VersionRow> {
    info.versions
        .iter()
        .map(|v| VersionRow::new(v, &info.aliases))
        .collect()
}

pub async fn info(args: InfoArgs, ctx: &Context) -> CliResult<()> {
    let info = info_of(args.model_name, ctx).await?;
    if !ctx.format.is_human() {
        return output::print_single(&info, ctx.format);
    }

    println!("Model:    {}", info.name);
    println!("Latest:   v{}", info.latest_version);
    println!("Aliases:  {}", format_aliases(&info.aliases));
    println!("Created:  {}", info.created_at.to_rfc3339());
    println!("Updated:  {}", info.updated_at.to_rfc3339());
    println!();
    output::print_output(version_rows(&info), ctx.format)
}

async fn info_of(model: ModelName, ctx: &Context) -> CliResult<ModelInfo> {
    match ctx.dispatcher.dispatch(Command::Info { model }).await? {
        Outcome::Info(info) => Ok(info),
        other => Err(unexpected("info", &other)),
    }
}

pub async fn history(args: HistoryArgs, ctx: &Context) -> CliResult<()> {
    let command = Command::History {
        model: args.model_name,
        alias: args.alias,
    };
    let entries = match ctx.dispatcher.dispatch(command).await? {
        Outcome::History(entries) => entries,
        other => return Err(unexpected("history", &other)),
    };
    if ctx.format.is_human() {
        output::print_output(entries.into_iter().map(HistoryRow::from).collect(), ctx.format)
    } else {
        output::print_single(&entries, ctx.format)
    }
}

pub async fn resolve(args: ResolveArgs, ctx: &Context) -> CliResult<()> {
    let command = Command::Resolve {
        selector: args.selector(),
        model: args.model_name,
    };
    let version = match ctx.dispatcher.dispatch(command).await? {
        Outcome::Resolved(version) => version,
        other => return Err(unexpected("resolve", &other)),
    };
    if ctx.format.is_human() {
        println!("{} v{}", version.model_name, version.version);
        println!("  Run:      {}", version.source_run_id);
        println!("  Artifact: {}", version.artifact_uri);
        println!("  Metrics:  {}", format_metrics(&version));
        if let Some(description) = &version.description {
            println!("  Description: {}", description);
        }
        Ok(())
    } else {
        output::print_single(&version, ctx.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelreg_types::{NewModelVersion, RunId};

    fn version(n: u64) -> ModelVersion {
        NewModelVersion::new(
            ModelName::new("churn").unwrap(),
            RunId::new(format!("run-{}", n)).unwrap(),
            "file:///models/churn",
        )
        .with_metric("auc", 0.8)
        .into_version(VersionNumber::new(n).unwrap(), chrono::Utc::now())
    }

    #[test]
    fn test_resolve_selector() {
        let args = ResolveArgs {
            model_name: ModelName::new("churn").unwrap(),
            version: None,
            alias: None,
        };
        assert_eq!(args.selector(), VersionSelector::Latest);

        let args = ResolveArgs {
            alias: Some(AliasName::champion()),
            ..args
        };
        assert_eq!(args.selector(), VersionSelector::Alias(AliasName::champion()));
    }

    #[test]
    fn test_version_row_lists_held_aliases() {
        let mut aliases = BTreeMap::new();
        aliases.insert(AliasName::champion(), VersionNumber::new(2).unwrap());
        aliases.insert(AliasName::staging(), VersionNumber::new(2).unwrap());

        let row = VersionRow::new(&version(2), &aliases);
        assert_eq!(row.version, "v2");
        assert_eq!(row.aliases, "champion, staging");
        assert_eq!(row.metrics, "auc=0.8000");

        let row = VersionRow::new(&version(1), &aliases);
        assert_eq!(row.aliases, "-");
    }

    #[test]
    fn test_version_rows_use_the_info_snapshot() {
        let mut aliases = BTreeMap::new();
        aliases.insert(AliasName::champion(), VersionNumber::new(1).unwrap());
        let now = chrono::Utc::now();
        let info = ModelInfo {
            name: ModelName::new("churn").unwrap(),
            created_at: now,
            updated_at: now,
            latest_version: VersionNumber::new(2).unwrap(),
            versions: vec![version(1), version(2)],
            aliases,
        };

        let rows = version_rows(&info);
        let held: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.version.as_str(), r.aliases.as_str()))
            .collect();
        assert_eq!(held, vec![("v1", "champion"), ("v2", "-")]);
    }
}
