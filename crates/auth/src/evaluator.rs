use std::sync::Arc;

use serde::Serialize;

use rentgate_core::{GlobalRole, OrganizationId, TeamId, User, UserId};

use crate::decision::{Decision, DecisionReason};
use crate::membership::{Membership, MembershipStatus};
use crate::roles::RoleCatalog;
use crate::scope::ResourceScope;
use crate::statements::{Action, ResourceType, Statement};

/// A fully resolved subject for authorization decisions.
///
/// Construction is decoupled from storage and transport: the gate fills in
/// `membership` and `organization_owner_id` from the collaborator stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub user_id: UserId,
    pub global_role: GlobalRole,
    pub active_organization_id: OrganizationId,
    pub membership: Option<Membership>,
    pub organization_owner_id: Option<UserId>,
}

impl Subject {
    pub fn new(user: &User, active_organization_id: OrganizationId) -> Self {
        Self {
            user_id: user.id,
            global_role: user.global_role,
            active_organization_id,
            membership: None,
            organization_owner_id: None,
        }
    }

    pub fn with_membership(mut self, membership: Option<Membership>) -> Self {
        self.membership = membership;
        self
    }

    pub fn with_organization_owner(mut self, owner: Option<UserId>) -> Self {
        self.organization_owner_id = owner;
        self
    }

    pub fn is_organization_owner(&self) -> bool {
        self.organization_owner_id == Some(self.user_id)
    }
}

/// Pure decision function over a subject, a statement and a resource scope.
///
/// - No IO
/// - No panics
/// - No shared mutable state; safe to call from any number of tasks
#[derive(Debug, Clone)]
pub struct PermissionEvaluator {
    catalog: Arc<RoleCatalog>,
}

impl PermissionEvaluator {
    pub fn new(catalog: Arc<RoleCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    /// Decide whether `subject` may perform `action` on a `resource_type`
    /// resource with the given `scope`.
    ///
    /// Checks run in a fixed order and the first conclusive one wins:
    /// tenant isolation, global admin, membership status, organization owner,
    /// resource ownership (read/contact only), team partition, role grants.
    pub fn evaluate(
        &self,
        subject: &Subject,
        action: Action,
        resource_type: ResourceType,
        scope: &ResourceScope,
    ) -> Decision {
        if subject.active_organization_id != scope.organization_id {
            return Decision::deny(DecisionReason::WrongTenant);
        }

        if subject.global_role.is_admin() {
            return Decision::allow(DecisionReason::AdminOverride);
        }

        let membership = match &subject.membership {
            Some(m) if m.organization_id == subject.active_organization_id => m,
            _ => return Decision::deny(DecisionReason::NoMembership),
        };
        match membership.status {
            MembershipStatus::Active => {}
            MembershipStatus::Invited => return Decision::deny(DecisionReason::NoMembership),
            MembershipStatus::Suspended | MembershipStatus::Removed => {
                return Decision::deny(DecisionReason::SuspendedMembership);
            }
        }

        if subject.is_organization_owner() {
            return Decision::allow(DecisionReason::OrgOwner);
        }

        if action.is_read_class() && scope.is_owned_or_caretaken_by(subject.user_id) {
            return Decision::allow(DecisionReason::ResourceOwner);
        }

        // Team scoping is a hard partition: it denies even when the role grants.
        if let (Some(member_team), Some(resource_team)) = (membership.team_id, scope.team_id) {
            if member_team != resource_team {
                return Decision::deny(DecisionReason::OutsideTeam);
            }
        }

        let Some(role) = membership.catalog_role() else {
            return Decision::deny(DecisionReason::UnknownRole);
        };
        if self.catalog.role_grants(role, resource_type, action) {
            Decision::allow(DecisionReason::RoleGrant)
        } else {
            Decision::deny(DecisionReason::InsufficientRole)
        }
    }

    /// Evaluate and describe the decision for audit tooling.
    pub fn explain(
        &self,
        subject: &Subject,
        action: Action,
        resource_type: ResourceType,
        scope: &ResourceScope,
    ) -> DecisionExplanation {
        let decision = self.evaluate(subject, action, resource_type, scope);
        let statement = Statement::new(resource_type, action);
        let membership = subject.membership.as_ref();

        let granted_actions = membership
            .and_then(Membership::catalog_role)
            .map(|role| {
                self.catalog
                    .actions_granted(role, resource_type)
                    .iter()
                    .map(|a| a.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default();

        DecisionExplanation {
            statement: statement.to_string(),
            decision,
            message: explain_reason(decision.reason, subject, &statement, scope),
            user_id: subject.user_id,
            active_organization_id: subject.active_organization_id,
            resource_organization_id: scope.organization_id,
            role: membership.map(|m| m.role.as_str().to_string()),
            membership_status: membership.map(|m| m.status),
            membership_team_id: membership.and_then(|m| m.team_id),
            resource_team_id: scope.team_id,
            granted_actions,
        }
    }
}

/// Detailed, serializable description of a decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionExplanation {
    pub statement: String,
    pub decision: Decision,
    pub message: String,
    pub user_id: UserId,
    pub active_organization_id: OrganizationId,
    pub resource_organization_id: OrganizationId,
    pub role: Option<String>,
    pub membership_status: Option<MembershipStatus>,
    pub membership_team_id: Option<TeamId>,
    pub resource_team_id: Option<TeamId>,
    /// Actions the membership role holds on this resource type.
    pub granted_actions: Vec<String>,
}

fn explain_reason(
    reason: DecisionReason,
    subject: &Subject,
    statement: &Statement,
    scope: &ResourceScope,
) -> String {
    match reason {
        DecisionReason::WrongTenant => format!(
            "Active organization {} does not match resource organization {}",
            subject.active_organization_id, scope.organization_id
        ),
        DecisionReason::AdminOverride => "Platform administrator; role catalog bypassed".to_string(),
        DecisionReason::NoMembership => format!(
            "User {} has no active membership in organization {}",
            subject.user_id, subject.active_organization_id
        ),
        DecisionReason::SuspendedMembership => format!(
            "Membership of user {} is suspended or removed",
            subject.user_id
        ),
        DecisionReason::OrgOwner => "User owns the organization".to_string(),
        DecisionReason::ResourceOwner => format!(
            "User is the owner or caretaker of the resource ('{}' is read-class)",
            statement.action
        ),
        DecisionReason::OutsideTeam => format!(
            "Resource belongs to team {} but membership is scoped to team {}",
            display_team(scope.team_id),
            display_team(subject.membership.as_ref().and_then(|m| m.team_id)),
        ),
        DecisionReason::RoleGrant => format!("Role grants '{statement}'"),
        DecisionReason::InsufficientRole => format!("Role does not grant '{statement}'"),
        DecisionReason::UnknownRole => format!(
            "Membership role '{}' is not in the role catalog",
            subject
                .membership
                .as_ref()
                .map(|m| m.role.as_str())
                .unwrap_or_default()
        ),
        DecisionReason::ResourceNotFound => "Resource does not exist".to_string(),
        DecisionReason::UnsupportedAction => {
            format!("'{statement}' is not a registered statement")
        }
    }
}

fn display_team(team: Option<TeamId>) -> String {
    team.map(|t| t.to_string()).unwrap_or_else(|| "<none>".to_string())
}
