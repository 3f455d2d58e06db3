use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

use rentgate_core::{GlobalRole, OrganizationId, TeamId, User, UserId};

use crate::membership::Membership;
use crate::session::{validate_claims, SessionClaims, TokenValidationError};

/// Evaluation context for one request.
///
/// Built once per request and passed by reference into the gate. Identity
/// fields are immutable; the only interior state is the memoised membership
/// lookup, which belongs to this context (and so to this user) alone.
#[derive(Debug)]
pub struct EvaluationContext {
    user_id: UserId,
    global_role: GlobalRole,
    active_organization_id: OrganizationId,
    active_team_id: Option<TeamId>,
    membership: OnceCell<Option<Membership>>,
}

impl EvaluationContext {
    pub fn new(user: &User, active_organization_id: OrganizationId) -> Self {
        Self::from_parts(user.id, user.global_role, active_organization_id)
    }

    pub fn from_parts(
        user_id: UserId,
        global_role: GlobalRole,
        active_organization_id: OrganizationId,
    ) -> Self {
        Self {
            user_id,
            global_role,
            active_organization_id,
            active_team_id: None,
            membership: OnceCell::new(),
        }
    }

    /// Build a context from verified session claims.
    pub fn from_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<Self, TokenValidationError> {
        validate_claims(claims, now)?;
        Ok(Self::from_parts(claims.sub, claims.global_role, claims.active_organization_id)
            .with_active_team(claims.active_team_id))
    }

    pub fn with_active_team(mut self, team_id: Option<TeamId>) -> Self {
        self.active_team_id = team_id;
        self
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn global_role(&self) -> GlobalRole {
        self.global_role
    }

    pub fn active_organization_id(&self) -> OrganizationId {
        self.active_organization_id
    }

    pub fn active_team_id(&self) -> Option<TeamId> {
        self.active_team_id
    }

    pub(crate) fn membership_cell(&self) -> &OnceCell<Option<Membership>> {
        &self.membership
    }

    /// The membership resolved earlier in this request, if any lookup ran.
    pub fn cached_membership(&self) -> Option<&Option<Membership>> {
        self.membership.get()
    }
}
