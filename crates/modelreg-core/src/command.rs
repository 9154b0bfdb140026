//! Command Dispatcher
//!
//! The registry's external surface is a closed set of commands. Each one is
//! routed to the service that owns it, and the typed result comes back as an
//! [`Outcome`]. Exit codes are derived from the error by the caller.

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::promotion::{AliasUpdate, PromotionEngine, PromotionOutcome, PromotionRequest};
use crate::query::{ModelInfo, ModelSummary, QueryService};
use crate::registration::{Registration, RegistrationRequest, RegistrationService};
use modelreg_types::{AliasChangeLogEntry, AliasName, ModelName, ModelVersion, VersionNumber, VersionSelector};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

/// Registry commands
#[derive(Debug, Clone)]
pub enum Command {
    Register(RegistrationRequest),
    SetAlias {
        model: ModelName,
        alias: AliasName,
        version: VersionNumber,
        actor: String,
    },
    UnsetAlias {
        model: ModelName,
        alias: AliasName,
        actor: String,
    },
    Promote(PromotionRequest),
    Rollback {
        model: ModelName,
        alias: AliasName,
        actor: String,
    },
    /// All models, or the versions of one
    List { model: Option<ModelName> },
    Info { model: ModelName },
    History {
        model: ModelName,
        alias: Option<AliasName>,
    },
    Resolve {
        model: ModelName,
        selector: VersionSelector,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Register(_) => "register",
            Command::SetAlias { .. } => "set-alias",
            Command::UnsetAlias { .. } => "unset-alias",
            Command::Promote(_) => "promote",
            Command::Rollback { .. } => "rollback",
            Command::List { .. } => "list",
            Command::Info { .. } => "info",
            Command::History { .. } => "history",
            Command::Resolve { .. } => "resolve",
        }
    }
}

/// Result of a dispatched command
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum Outcome {
    Registered(Registration),
    AliasUpdated(AliasUpdate),
    Promoted(PromotionOutcome),
    Models(Vec<ModelSummary>),
    Versions(Vec<ModelVersion>),
    Info(ModelInfo),
    History(Vec<AliasChangeLogEntry>),
    Resolved(ModelVersion),
}

/// Routes commands to the registry services
pub struct Dispatcher {
    registration: RegistrationService,
    promotion: PromotionEngine,
    query: QueryService,
}

impl Dispatcher {
    pub fn new(
        registration: RegistrationService,
        promotion: PromotionEngine,
        query: QueryService,
    ) -> Self {
        Self {
            registration,
            promotion,
            query,
        }
    }

    /// Wire services from configuration; all share one store.
    pub async fn from_config(config: &RegistryConfig) -> Result<Self> {
        let store = config.build_store().await?;
        let tracker = config.build_tracker()?;
        let artifacts = config.build_artifacts()?;
        debug!(
            store = store.backend(),
            tracker = tracker.name(),
            "registry services wired"
        );

        Ok(Self::new(
            RegistrationService::new(
                Arc::clone(&store),
                tracker,
                artifacts,
                config.registration_settings(),
            ),
            PromotionEngine::new(
                Arc::clone(&store),
                config.promotion.clone(),
                config.retry.clone(),
            ),
            QueryService::new(store),
        ))
    }

    pub async fn dispatch(&self, command: Command) -> Result<Outcome> {
        let span = info_span!("command", name = command.name());
        self.route(command).instrument(span).await
    }

    async fn route(&self, command: Command) -> Result<Outcome> {
        match command {
            Command::Register(request) => self
                .registration
                .register(request)
                .await
                .map(Outcome::Registered),
            Command::SetAlias {
                model,
                alias,
                version,
                actor,
            } => self
                .promotion
                .set_alias(&model, &alias, version, &actor)
                .await
                .map(Outcome::AliasUpdated),
            Command::UnsetAlias {
                model,
                alias,
                actor,
            } => self
                .promotion
                .unset_alias(&model, &alias, &actor)
                .await
                .map(Outcome::AliasUpdated),
            Command::Promote(request) => self
                .promotion
                .promote(request)
                .await
                .map(Outcome::Promoted),
            Command::Rollback {
                model,
                alias,
                actor,
            } => self
                .promotion
                .rollback(&model, &alias, &actor)
                .await
                .map(Outcome::AliasUpdated),
            Command::List { model: None } => self.query.summaries().await.map(Outcome::Models),
            Command::List { model: Some(model) } => self
                .query
                .list_versions(&model)
                .await
                .map(Outcome::Versions),
            Command::Info { model } => self.query.info(&model).await.map(Outcome::Info),
            Command::History { model, alias } => self
                .query
                .history(&model, alias.as_ref())
                .await
                .map(Outcome::History),
            Command::Resolve { model, selector } => self
                .query
                .resolve(&model, &selector)
                .await
                .map(Outcome::Resolved),
        }
    }
}
