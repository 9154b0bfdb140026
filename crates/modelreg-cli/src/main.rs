//! modelreg CLI - Command-line interface for the model registry
//!
//! This CLI lets training pipelines and operators:
//! - Register finished experiment runs as immutable model versions
//! - Point aliases (staging, champion, ...) at versions
//! - Promote versions through a metric gate, and roll aliases back
//! - Inspect models, versions and the alias change log
//!
//! Exit codes: 0 success, 1 usage, 2 not found, 3 backend or concurrency
//! failure, 4 promotion rejected.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use modelreg_core::config::LoggingConfig;
use modelreg_core::{Dispatcher, RegistryConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod error;
mod output;

use commands::{alias, promote, query, register, Context};
use error::{CliError, CliResult};
use output::{print_error, OutputFormat};

/// modelreg CLI application
#[derive(Parser)]
#[command(name = "modelreg")]
#[command(about = "Model registry with immutable versions, aliases and gated promotion", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MODELREG_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table", global = true)]
    output: OutputFormat,

    /// Name recorded in version and alias audit fields
    #[arg(long, env = "MODELREG_ACTOR", global = true)]
    actor: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Register a run as a new model version
    Register(register::RegisterArgs),

    /// Point an alias at a version
    SetAlias(alias::SetAliasArgs),

    /// Remove an alias
    UnsetAlias(alias::UnsetAliasArgs),

    /// Promote a version into an alias, subject to the metric gate
    Promote(promote::PromoteArgs),

    /// Restore an alias to its previous version
    Rollback(alias::RollbackArgs),

    /// List models, or the versions of one model
    #[command(alias = "ls")]
    List(query::ListArgs),

    /// Show a model's versions and aliases
    Info(query::InfoArgs),

    /// Show the alias change log
    History(query::HistoryArgs),

    /// Resolve a version number, alias or latest version
    Resolve(query::ResolveArgs),

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also arrive here
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e.to_string());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = RegistryConfig::load(cli.config.as_deref())?;
    init_tracing(cli.verbose, &config.logging).map_err(CliError::Logging)?;

    if let Commands::Config = cli.command {
        return show_config(&config, cli.output);
    }

    let actor = resolve_actor(cli.actor)?;
    let ctx = Context {
        dispatcher: Dispatcher::from_config(&config).await?,
        actor,
        format: cli.output,
    };

    match cli.command {
        Commands::Register(args) => register::execute(args, &ctx).await,
        Commands::SetAlias(args) => alias::set(args, &ctx).await,
        Commands::UnsetAlias(args) => alias::unset(args, &ctx).await,
        Commands::Promote(args) => promote::execute(args, &ctx).await,
        Commands::Rollback(args) => alias::rollback(args, &ctx).await,
        Commands::List(args) => query::list(args, &ctx).await,
        Commands::Info(args) => query::info(args, &ctx).await,
        Commands::History(args) => query::history(args, &ctx).await,
        Commands::Resolve(args) => query::resolve(args, &ctx).await,
        Commands::Config => Ok(()),
    }
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing(verbose: bool, logging: &LoggingConfig) -> anyhow::Result<()> {
    let fallback = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .with_context(|| format!("invalid log level '{}'", fallback))?;

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    }
    .context("failed to install tracing subscriber")
}

fn resolve_actor(flag: Option<String>) -> CliResult<String> {
    let actor = flag
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "modelreg".to_string());
    if actor.trim().is_empty() {
        return Err(CliError::InvalidInput("--actor must not be empty".to_string()));
    }
    Ok(actor)
}

fn show_config(config: &RegistryConfig, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
        _ => output::print_single(config, format),
    }
}
