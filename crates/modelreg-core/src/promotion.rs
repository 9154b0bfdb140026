//! Alias / Promotion Engine
//!
//! Per `(model, alias)` the state is either unassigned or assigned to one
//! version. Plain `set_alias`/`unset_alias` move between states freely;
//! `promote` is a gated `set` whose decision is applied with compare-and-set
//! against the incumbent it was evaluated on, so a concurrent change forces a
//! re-evaluation instead of being overwritten.

use crate::error::{RegistryError, Result};
use crate::gate::{self, GateDecision};
use crate::retry::RetryPolicy;
use modelreg_store::{AliasPrecondition, RegistryStore, StoreError};
use modelreg_types::{
    AliasChange, AliasChangeReason, AliasName, ModelName, PolicySet, VersionNumber,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Request to promote a version into an alias
#[derive(Debug, Clone)]
pub struct PromotionRequest {
    pub model_name: ModelName,
    /// `None` promotes the latest version
    pub version: Option<VersionNumber>,
    pub to_alias: AliasName,
    /// Cleared after a successful promotion if it still points at the
    /// promoted version
    pub from_alias: Option<AliasName>,
    pub force: bool,
    pub actor: String,
}

impl PromotionRequest {
    /// Promote `version` to `champion`.
    pub fn new(model_name: ModelName, version: VersionNumber, actor: impl Into<String>) -> Self {
        Self {
            model_name,
            version: Some(version),
            to_alias: AliasName::champion(),
            from_alias: None,
            force: false,
            actor: actor.into(),
        }
    }

    pub fn latest(model_name: ModelName, actor: impl Into<String>) -> Self {
        Self {
            version: None,
            ..Self::new(model_name, VersionNumber::FIRST, actor)
        }
    }

    pub fn to_alias(mut self, alias: AliasName) -> Self {
        self.to_alias = alias;
        self
    }

    pub fn from_alias(mut self, alias: AliasName) -> Self {
        self.from_alias = Some(alias);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Alias state after a set, unset or rollback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasUpdate {
    pub model_name: ModelName,
    pub alias: AliasName,
    /// `None` when the alias is now unassigned
    pub version: Option<VersionNumber>,
    pub previous: Option<VersionNumber>,
}

/// Result of a successful promotion
#[derive(Debug, Clone, Serialize)]
pub struct PromotionOutcome {
    pub model_name: ModelName,
    pub alias: AliasName,
    pub version: VersionNumber,
    pub previous: Option<VersionNumber>,
    pub decision: GateDecision,
    /// Source alias that was cleared, if any
    pub cleared: Option<AliasName>,
}

/// Alias state machine and gated promotion
pub struct PromotionEngine {
    store: Arc<dyn RegistryStore>,
    policies: PolicySet,
    retry: RetryPolicy,
}

impl PromotionEngine {
    pub fn new(store: Arc<dyn RegistryStore>, policies: PolicySet, retry: RetryPolicy) -> Self {
        Self {
            store,
            policies,
            retry,
        }
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    /// Point `alias` at `version` unconditionally. Returns the previous target.
    #[instrument(skip(self), fields(model = %model, alias = %alias, version = %version))]
    pub async fn set_alias(
        &self,
        model: &ModelName,
        alias: &AliasName,
        version: VersionNumber,
        actor: &str,
    ) -> Result<AliasUpdate> {
        let previous = self
            .retry
            .run("store.set_alias", |_| {
                let store = self.store.clone();
                async move {
                    store
                        .set_alias(model, alias, version, AliasChange::set(actor))
                        .await
                        .map_err(RegistryError::from)
                }
            })
            .await?;

        info!(previous = ?previous, "alias set");
        Ok(AliasUpdate {
            model_name: model.clone(),
            alias: alias.clone(),
            version: Some(version),
            previous,
        })
    }

    /// Remove `alias`; a no-op when it is already unassigned.
    #[instrument(skip(self), fields(model = %model, alias = %alias))]
    pub async fn unset_alias(
        &self,
        model: &ModelName,
        alias: &AliasName,
        actor: &str,
    ) -> Result<AliasUpdate> {
        let previous = self
            .retry
            .run("store.unset_alias", |_| {
                let store = self.store.clone();
                async move {
                    store
                        .unset_alias(model, alias, AliasChange::unset(actor))
                        .await
                        .map_err(RegistryError::from)
                }
            })
            .await?;

        match previous {
            Some(v) => info!(previous = %v, "alias removed"),
            None => info!("alias was not assigned"),
        }
        Ok(AliasUpdate {
            model_name: model.clone(),
            alias: alias.clone(),
            version: None,
            previous,
        })
    }

    /// Gated reassignment of `request.to_alias`.
    #[instrument(skip(self, request), fields(model = %request.model_name, alias = %request.to_alias, force = request.force))]
    pub async fn promote(&self, request: PromotionRequest) -> Result<PromotionOutcome> {
        let policy = self.policies.for_alias(&request.to_alias);

        let (version, previous, decision) = self
            .retry
            .run("promote", |attempt| {
                let store = self.store.clone();
                let request = &request;
                async move {
                    let doc = store.snapshot(&request.model_name).await?;
                    let candidate_number = match request.version {
                        Some(v) => v,
                        None => doc
                            .latest_version()
                            .ok_or_else(|| RegistryError::ModelNotFound(request.model_name.clone()))?,
                    };
                    let candidate = doc.version(candidate_number)?;
                    let incumbent_number = doc.aliases.get(&request.to_alias).copied();
                    let incumbent = incumbent_number.map(|v| doc.version(v)).transpose()?;

                    let decision = gate::evaluate(policy, candidate, incumbent, request.force);
                    if let GateDecision::Rejected { reason } = decision {
                        warn!(candidate = %candidate_number, %reason, "promotion rejected");
                        return Err(RegistryError::PromotionRejected {
                            model: request.model_name.clone(),
                            alias: request.to_alias.clone(),
                            candidate: candidate_number,
                            reason,
                        });
                    }

                    let reason = if matches!(decision, GateDecision::Forced) {
                        AliasChangeReason::ForcePromote
                    } else {
                        AliasChangeReason::Promote
                    };
                    store
                        .compare_and_set_alias(
                            &request.model_name,
                            &request.to_alias,
                            incumbent_number,
                            candidate_number,
                            AliasChange::new(request.actor.as_str(), reason),
                        )
                        .await
                        .map_err(|e| {
                            if e.is_conflict() {
                                warn!(attempt, error = %e, "alias changed during promotion");
                            }
                            RegistryError::from(e)
                        })?;
                    Ok((candidate_number, incumbent_number, decision))
                }
            })
            .await?;

        info!(version = %version, previous = ?previous, "promoted");

        let cleared = match &request.from_alias {
            Some(from) if from != &request.to_alias => {
                self.clear_source_alias(&request.model_name, from, version, &request.actor)
                    .await
            }
            _ => None,
        };

        Ok(PromotionOutcome {
            model_name: request.model_name,
            alias: request.to_alias,
            version,
            previous,
            decision,
            cleared,
        })
    }

    /// Unset `from` if it still points at `promoted`.
    ///
    /// The promotion has already landed, so a failure here is logged and
    /// reported as "nothing cleared" rather than failing the call.
    async fn clear_source_alias(
        &self,
        model: &ModelName,
        from: &AliasName,
        promoted: VersionNumber,
        actor: &str,
    ) -> Option<AliasName> {
        let result = self
            .retry
            .run("clear-source-alias", |_| {
                let store = self.store.clone();
                async move {
                    let change = AliasChange::new(actor, AliasChangeReason::ClearedAfterPromotion);
                    match store
                        .update_alias(model, from, None, AliasPrecondition::Current(Some(promoted)), change)
                        .await
                    {
                        Ok(_) => Ok(true),
                        // Source alias no longer points at the promoted version.
                        Err(StoreError::AliasConflict { actual, .. }) => {
                            info!(alias = %from, current = ?actual, "source alias left in place");
                            Ok(false)
                        }
                        Err(e) => Err(RegistryError::from(e)),
                    }
                }
            })
            .await;

        match result {
            Ok(true) => {
                info!(alias = %from, "cleared source alias");
                Some(from.clone())
            }
            Ok(false) => None,
            Err(e) => {
                warn!(alias = %from, error = %e, "promotion applied but source alias was not cleared");
                None
            }
        }
    }

    /// Restore `alias` to the target it had before its most recent change.
    #[instrument(skip(self), fields(model = %model, alias = %alias))]
    pub async fn rollback(
        &self,
        model: &ModelName,
        alias: &AliasName,
        actor: &str,
    ) -> Result<AliasUpdate> {
        let (target, previous) = self
            .retry
            .run("rollback", |_| {
                let store = self.store.clone();
                async move {
                    let doc = store.snapshot(model).await?;
                    let last = doc
                        .alias_log
                        .iter()
                        .rev()
                        .find(|e| &e.alias_name == alias)
                        .ok_or_else(|| RegistryError::AliasNotFound {
                            model: model.clone(),
                            alias: alias.clone(),
                        })?;
                    let current = doc.aliases.get(alias).copied();
                    let target = last.old_version;

                    store
                        .update_alias(
                            model,
                            alias,
                            target,
                            AliasPrecondition::Current(current),
                            AliasChange::new(actor, AliasChangeReason::Rollback),
                        )
                        .await?;
                    Ok((target, current))
                }
            })
            .await?;

        info!(restored = ?target, replaced = ?previous, "alias rolled back");
        Ok(AliasUpdate {
            model_name: model.clone(),
            alias: alias.clone(),
            version: target,
            previous,
        })
    }
}
