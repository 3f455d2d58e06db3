use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use rentgate_core::{DomainError, OrganizationId, TeamId, UserId};

use crate::error::StoreError;
use crate::roles::{Role, RoleName};
use crate::store::{bounded, MembershipStore};

/// Membership lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    #[default]
    Invited,
    Active,
    Suspended,
    Removed,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Invited => "invited",
            MembershipStatus::Active => "active",
            MembershipStatus::Suspended => "suspended",
            MembershipStatus::Removed => "removed",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, MembershipStatus::Active)
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    ///
    /// `removed` is terminal; rows are soft-removed, never deleted.
    pub fn can_transition_to(&self, next: MembershipStatus) -> bool {
        use MembershipStatus::*;
        matches!(
            (self, next),
            (Invited, Active)
                | (Invited, Removed)
                | (Active, Suspended)
                | (Active, Removed)
                | (Suspended, Active)
                | (Suspended, Removed)
        )
    }
}

impl core::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invited" => Ok(MembershipStatus::Invited),
            "active" => Ok(MembershipStatus::Active),
            "suspended" => Ok(MembershipStatus::Suspended),
            "removed" => Ok(MembershipStatus::Removed),
            other => Err(DomainError::unknown_name("membership status", other)),
        }
    }
}

/// A user's membership in an organization.
///
/// This is an authorization boundary object: it states *which organization*
/// the user belongs to, under which role, and optionally which team partition.
/// `(user_id, organization_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub role: RoleName,
    pub status: MembershipStatus,
    pub team_id: Option<TeamId>,
}

impl Membership {
    /// An active, organization-wide membership.
    pub fn active(user_id: UserId, organization_id: OrganizationId, role: impl Into<RoleName>) -> Self {
        Self {
            user_id,
            organization_id,
            role: role.into(),
            status: MembershipStatus::Active,
            team_id: None,
        }
    }

    pub fn in_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn with_status(mut self, status: MembershipStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn catalog_role(&self) -> Option<Role> {
        self.role.role()
    }
}

/// Resolves a user's membership in an organization.
#[derive(Debug, Clone)]
pub struct MembershipResolver<M> {
    store: M,
    timeout: Duration,
}

impl<M: MembershipStore> MembershipResolver<M> {
    pub fn new(store: M, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &M {
        &self.store
    }

    /// The membership row for `(user, organization)`, whatever its status.
    ///
    /// The evaluator decides what a non-active status means; `None` means no
    /// row exists.
    #[instrument(
        level = "debug",
        skip(self),
        fields(user_id = %user_id, organization_id = %organization_id),
        err
    )]
    pub async fn resolve(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<Option<Membership>, StoreError> {
        let found = bounded(
            "find_membership",
            self.timeout,
            self.store.find_membership(user_id, organization_id),
        )
        .await?;

        match found {
            Some(m) if m.user_id != user_id || m.organization_id != organization_id => {
                Err(StoreError::Corrupt(format!(
                    "membership lookup for ({user_id}, {organization_id}) returned ({}, {})",
                    m.user_id, m.organization_id
                )))
            }
            other => Ok(other),
        }
    }

    /// Only an active membership; anything else is `None`.
    pub async fn resolve_active(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self
            .resolve(user_id, organization_id)
            .await?
            .filter(Membership::is_active))
    }
}
