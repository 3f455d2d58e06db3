//! Authorization gate: the per-request façade used by every call site.
//!
//! GraphQL resolvers, REST middleware and UI gating all go through the same
//! [`AuthorizationGate`], so they reach the same decision for the same inputs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::instrument;

use rentgate_core::{OrganizationId, ResourceId, UserId};

use crate::config::GateConfig;
use crate::context::EvaluationContext;
use crate::decision::{Decision, DecisionReason};
use crate::error::{AuthorizationDenied, AuthzError, StoreError};
use crate::evaluator::{DecisionExplanation, PermissionEvaluator, Subject};
use crate::guard::Guarded;
use crate::membership::{Membership, MembershipResolver};
use crate::roles::{Grants, RoleCatalog};
use crate::scope::{ResourceScope, ResourceScopeIndex, ScopeError};
use crate::statements::{Action, ResourceType, StatementRegistry};
use crate::store::{bounded, MembershipStore, OrganizationStore, ResourceScopeStore};

/// Stateless authorization façade over the collaborator stores.
///
/// Holds no per-user state; the only memoisation lives on the
/// [`EvaluationContext`] passed into each call.
#[derive(Debug, Clone)]
pub struct AuthorizationGate<M, S, O> {
    memberships: MembershipResolver<M>,
    scopes: ResourceScopeIndex<S>,
    organizations: O,
    evaluator: PermissionEvaluator,
    registry: &'static StatementRegistry,
    config: GateConfig,
}

impl<M, S, O> AuthorizationGate<M, S, O>
where
    M: MembershipStore,
    S: ResourceScopeStore,
    O: OrganizationStore,
{
    pub fn new(
        catalog: Arc<RoleCatalog>,
        memberships: M,
        scopes: S,
        organizations: O,
        config: GateConfig,
    ) -> Self {
        Self {
            memberships: MembershipResolver::new(memberships, config.store_timeout),
            scopes: ResourceScopeIndex::new(scopes, config.store_timeout),
            organizations,
            evaluator: PermissionEvaluator::new(catalog),
            registry: StatementRegistry::standard(),
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn registry(&self) -> &StatementRegistry {
        self.registry
    }

    pub fn catalog(&self) -> &RoleCatalog {
        self.evaluator.catalog()
    }

    /// Grants for a stored role name; `None` if the role is unknown.
    pub fn grants_for(&self, role_name: &str) -> Option<&Grants> {
        self.catalog().grants_for(role_name)
    }

    pub fn actions_for(&self, resource_type: ResourceType) -> &BTreeSet<Action> {
        self.registry.actions_for(resource_type)
    }

    /// Decide `action` on a resource (or on the organization when
    /// `resource_id` is `None`).
    ///
    /// Denials are `Ok(decision)`; only store failures are `Err`.
    #[instrument(
        level = "debug",
        skip(self, ctx),
        fields(
            user_id = %ctx.user_id(),
            organization_id = %ctx.active_organization_id(),
            resource_type = %resource_type,
            action = %action,
        )
    )]
    pub async fn check(
        &self,
        ctx: &EvaluationContext,
        resource_type: ResourceType,
        action: Action,
        resource_id: Option<ResourceId>,
    ) -> Result<Decision, StoreError> {
        let decision = match self.decide(ctx, resource_type, action, resource_id).await {
            Ok(decision) => decision,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    user_id = %ctx.user_id(),
                    organization_id = %ctx.active_organization_id(),
                    resource_type = %resource_type,
                    action = %action,
                    resource_id = ?resource_id,
                    "authorization lookup failed; failing closed"
                );
                return Err(err);
            }
        };

        record_decision(ctx, resource_type, action, resource_id, &decision);
        Ok(decision)
    }

    /// Require `action`; a denial is an [`AuthzError::Denied`] carrying the reason.
    pub async fn assert_can(
        &self,
        ctx: &EvaluationContext,
        resource_type: ResourceType,
        action: Action,
        resource_id: Option<ResourceId>,
    ) -> Result<(), AuthzError> {
        let decision = self.check(ctx, resource_type, action, resource_id).await?;
        if decision.allow {
            Ok(())
        } else {
            Err(AuthzError::Denied(AuthorizationDenied {
                reason: decision.reason,
                resource_type,
                action,
                resource_id,
            }))
        }
    }

    /// Non-raising variant for UI gating. Store failures answer `false`.
    pub async fn can(
        &self,
        ctx: &EvaluationContext,
        resource_type: ResourceType,
        action: Action,
        resource_id: Option<ResourceId>,
    ) -> bool {
        matches!(
            self.check(ctx, resource_type, action, resource_id).await,
            Ok(Decision { allow: true, .. })
        )
    }

    /// Every registered action the subject may perform on the resource.
    ///
    /// Store lookups run once for the whole set. A missing resource yields an
    /// empty set. The outcome is logged as one summary event rather than a
    /// decision per action.
    pub async fn permitted_actions(
        &self,
        ctx: &EvaluationContext,
        resource_type: ResourceType,
        resource_id: Option<ResourceId>,
    ) -> Result<BTreeSet<Action>, StoreError> {
        let permitted = match self.scope_for(ctx, resource_type, resource_id).await? {
            Some(scope) => {
                let subject = self.subject_for(ctx, &scope).await?;
                self.registry
                    .actions_for(resource_type)
                    .iter()
                    .copied()
                    .filter(|action| {
                        self.evaluator
                            .evaluate(&subject, *action, resource_type, &scope)
                            .allow
                    })
                    .collect()
            }
            None => BTreeSet::new(),
        };

        tracing::info!(
            user_id = %ctx.user_id(),
            organization_id = %ctx.active_organization_id(),
            resource_type = %resource_type,
            resource_id = ?resource_id,
            permitted = ?permitted,
            denied = self.registry.actions_for(resource_type).len() - permitted.len(),
            "permitted actions resolved"
        );
        Ok(permitted)
    }

    /// Permitted actions for several resource types at organization level.
    pub async fn permitted_statements(
        &self,
        ctx: &EvaluationContext,
        resource_types: &[ResourceType],
    ) -> Result<BTreeMap<ResourceType, BTreeSet<Action>>, StoreError> {
        let mut out = BTreeMap::new();
        for rt in resource_types {
            out.insert(*rt, self.permitted_actions(ctx, *rt, None).await?);
        }
        Ok(out)
    }

    /// Check every requirement a command declares, stopping at the first denial.
    pub async fn assert_command<C>(&self, ctx: &EvaluationContext, command: &C) -> Result<(), AuthzError>
    where
        C: Guarded + ?Sized,
    {
        for requirement in command.requirements() {
            let stmt = requirement.statement;
            self.assert_can(ctx, stmt.resource_type, stmt.action, requirement.resource_id)
                .await?;
        }
        Ok(())
    }

    /// Evaluate and describe the decision for audit tooling.
    ///
    /// Decisions reached before a scope exists (unsupported statement, missing
    /// resource) come back as [`AuthzError::Denied`].
    pub async fn explain(
        &self,
        ctx: &EvaluationContext,
        resource_type: ResourceType,
        action: Action,
        resource_id: Option<ResourceId>,
    ) -> Result<DecisionExplanation, AuthzError> {
        let denied = |reason| {
            AuthzError::Denied(AuthorizationDenied {
                reason,
                resource_type,
                action,
                resource_id,
            })
        };

        if !self.registry.is_valid_action(resource_type, action) {
            return Err(denied(DecisionReason::UnsupportedAction));
        }
        let Some(scope) = self.scope_for(ctx, resource_type, resource_id).await? else {
            return Err(denied(DecisionReason::ResourceNotFound));
        };
        let subject = self.subject_for(ctx, &scope).await?;
        Ok(self.evaluator.explain(&subject, action, resource_type, &scope))
    }

    async fn decide(
        &self,
        ctx: &EvaluationContext,
        resource_type: ResourceType,
        action: Action,
        resource_id: Option<ResourceId>,
    ) -> Result<Decision, StoreError> {
        if !self.registry.is_valid_action(resource_type, action) {
            return Ok(Decision::from_reason(DecisionReason::UnsupportedAction));
        }

        let Some(scope) = self.scope_for(ctx, resource_type, resource_id).await? else {
            return Ok(Decision::from_reason(DecisionReason::ResourceNotFound));
        };

        let subject = self.subject_for(ctx, &scope).await?;
        Ok(self.evaluator.evaluate(&subject, action, resource_type, &scope))
    }

    /// `Ok(None)` when the resource does not exist.
    async fn scope_for(
        &self,
        ctx: &EvaluationContext,
        resource_type: ResourceType,
        resource_id: Option<ResourceId>,
    ) -> Result<Option<ResourceScope>, StoreError> {
        let Some(resource_id) = resource_id else {
            return Ok(Some(
                ResourceScope::organization(ctx.active_organization_id())
                    .with_team(ctx.active_team_id()),
            ));
        };

        match self.scopes.scope_of(resource_type, resource_id).await {
            Ok(scope) => Ok(Some(scope)),
            Err(ScopeError::NotFound { .. }) => Ok(None),
            Err(ScopeError::Store(err)) => Err(err),
        }
    }

    /// Load only what the evaluator can still use for this scope.
    async fn subject_for(
        &self,
        ctx: &EvaluationContext,
        scope: &ResourceScope,
    ) -> Result<Subject, StoreError> {
        let mut subject = Subject {
            user_id: ctx.user_id(),
            global_role: ctx.global_role(),
            active_organization_id: ctx.active_organization_id(),
            membership: None,
            organization_owner_id: None,
        };

        if scope.organization_id != subject.active_organization_id || subject.global_role.is_admin() {
            return Ok(subject);
        }

        let membership = self.membership(ctx).await?;
        if membership.as_ref().is_some_and(Membership::is_active) {
            subject.organization_owner_id = self.owner_of(subject.active_organization_id).await?;
        }
        subject.membership = membership;
        Ok(subject)
    }

    async fn membership(&self, ctx: &EvaluationContext) -> Result<Option<Membership>, StoreError> {
        let resolve = || self.memberships.resolve(ctx.user_id(), ctx.active_organization_id());

        if !self.config.cache_membership {
            return resolve().await;
        }
        ctx.membership_cell().get_or_try_init(resolve).await.cloned()
    }

    async fn owner_of(&self, organization_id: OrganizationId) -> Result<Option<UserId>, StoreError> {
        bounded(
            "owner_id_of",
            self.config.store_timeout,
            self.organizations.owner_id_of(organization_id),
        )
        .await
    }
}

fn record_decision(
    ctx: &EvaluationContext,
    resource_type: ResourceType,
    action: Action,
    resource_id: Option<ResourceId>,
    decision: &Decision,
) {
    if decision.allow {
        tracing::debug!(
            reason = %decision.reason,
            user_id = %ctx.user_id(),
            organization_id = %ctx.active_organization_id(),
            resource_type = %resource_type,
            action = %action,
            resource_id = ?resource_id,
            "authorization allowed"
        );
    } else {
        tracing::info!(
            reason = %decision.reason,
            user_id = %ctx.user_id(),
            organization_id = %ctx.active_organization_id(),
            resource_type = %resource_type,
            action = %action,
            resource_id = ?resource_id,
            "authorization denied"
        );
    }
}
