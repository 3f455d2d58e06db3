//! Tenancy records: users, organizations and teams.
//!
//! These are the identity-side inputs to authorization. Persistence and
//! lifecycle (signup, invitations, profile edits) live outside this crate.

use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::{OrganizationId, TeamId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// Platform-wide role tag carried on the user record.
///
/// `Admin` is the superuser escape hatch. It is independent of any
/// organization membership role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRole {
    Admin,
    #[default]
    User,
}

impl GlobalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalRole::Admin => "admin",
            GlobalRole::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, GlobalRole::Admin)
    }
}

impl core::fmt::Display for GlobalRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GlobalRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(GlobalRole::Admin),
            "user" => Ok(GlobalRole::User),
            other => Err(DomainError::unknown_name("global role", other)),
        }
    }
}

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub global_role: GlobalRole,
}

impl User {
    pub fn new(id: UserId, email: impl Into<String>) -> Result<Self, DomainError> {
        let email = email.into();
        validate_email(&email)?;
        Ok(Self {
            id,
            email,
            global_role: GlobalRole::User,
        })
    }

    pub fn with_global_role(mut self, role: GlobalRole) -> Self {
        self.global_role = role;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.global_role.is_admin()
    }
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(DomainError::validation("email must contain '@'"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(DomainError::validation(format!("malformed email '{email}'")));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Organization
// ─────────────────────────────────────────────────────────────────────────────

/// Plan limits attached to an organization's subscription.
///
/// `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubscriptionLimits {
    pub max_properties: Option<u32>,
    pub max_members: Option<u32>,
}

impl SubscriptionLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn allows_more_properties(&self, current: u32) -> bool {
        self.max_properties.is_none_or(|max| current < max)
    }

    pub fn allows_more_members(&self, current: u32) -> bool {
        self.max_members.is_none_or(|max| current < max)
    }
}

/// An organization: the tenant boundary.
///
/// # Invariants
/// - Every resource belongs to exactly one organization.
/// - `agent_owner_id` is the user who created the organization; it is never
///   reassigned by this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub agent_owner_id: UserId,
    pub limits: SubscriptionLimits,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(id: OrganizationId, name: impl Into<String>, agent_owner_id: UserId) -> Self {
        Self {
            id,
            name: name.into(),
            agent_owner_id,
            limits: SubscriptionLimits::unlimited(),
            created_at: Utc::now(),
        }
    }

    pub fn with_limits(mut self, limits: SubscriptionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.agent_owner_id == user_id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Team
// ─────────────────────────────────────────────────────────────────────────────

/// A team partitions a subset of an organization's resources to a subset of
/// its staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub description: Option<String>,
}

impl Team {
    pub fn new(id: TeamId, organization_id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            id,
            organization_id,
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
