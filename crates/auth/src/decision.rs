//! Authorization decisions and their machine-readable reasons.

use serde::{Deserialize, Serialize};

/// Why a decision was reached.
///
/// Serialized in snake_case (`"wrong_tenant"`, `"role_grant"`, ...) for
/// structured audit logs. Never shown verbatim to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    // allow
    AdminOverride,
    OrgOwner,
    ResourceOwner,
    RoleGrant,

    // deny
    WrongTenant,
    NoMembership,
    SuspendedMembership,
    OutsideTeam,
    InsufficientRole,
    UnknownRole,
    ResourceNotFound,
    UnsupportedAction,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::AdminOverride => "admin_override",
            DecisionReason::OrgOwner => "org_owner",
            DecisionReason::ResourceOwner => "resource_owner",
            DecisionReason::RoleGrant => "role_grant",
            DecisionReason::WrongTenant => "wrong_tenant",
            DecisionReason::NoMembership => "no_membership",
            DecisionReason::SuspendedMembership => "suspended_membership",
            DecisionReason::OutsideTeam => "outside_team",
            DecisionReason::InsufficientRole => "insufficient_role",
            DecisionReason::UnknownRole => "unknown_role",
            DecisionReason::ResourceNotFound => "resource_not_found",
            DecisionReason::UnsupportedAction => "unsupported_action",
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(
            self,
            DecisionReason::AdminOverride
                | DecisionReason::OrgOwner
                | DecisionReason::ResourceOwner
                | DecisionReason::RoleGrant
        )
    }
}

impl core::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single evaluation.
///
/// `allow` is always consistent with `reason`; construct through
/// [`Decision::from_reason`] (or the `allow`/`deny` helpers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    pub reason: DecisionReason,
}

impl Decision {
    pub fn from_reason(reason: DecisionReason) -> Self {
        Self {
            allow: reason.is_allow(),
            reason,
        }
    }

    pub(crate) fn allow(reason: DecisionReason) -> Self {
        debug_assert!(reason.is_allow());
        Self::from_reason(reason)
    }

    pub(crate) fn deny(reason: DecisionReason) -> Self {
        debug_assert!(!reason.is_allow());
        Self::from_reason(reason)
    }

    pub fn is_allowed(&self) -> bool {
        self.allow
    }
}
