use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::instrument;

use rentgate_auth::{
    Membership, MembershipStatus, MembershipStore, OrganizationStore, ResourceScopeStore,
    ResourceType, RoleName, ScopeRecord, StoreError,
};
use rentgate_core::{Organization, OrganizationId, ResourceId, Team, TeamId, User, UserId};

use super::DirectoryError;

#[derive(Debug, Default)]
struct Directory {
    users: HashMap<UserId, User>,
    organizations: HashMap<OrganizationId, Organization>,
    teams: HashMap<TeamId, Team>,
    memberships: HashMap<(UserId, OrganizationId), Membership>,
    resources: HashMap<(ResourceType, ResourceId), ScopeRecord>,
}

impl Directory {
    fn organization(&self, id: OrganizationId) -> Result<&Organization, DirectoryError> {
        self.organizations
            .get(&id)
            .ok_or_else(|| DirectoryError::not_found("organization", id))
    }

    fn team_in(&self, organization_id: OrganizationId, team_id: TeamId) -> Result<&Team, DirectoryError> {
        match self.teams.get(&team_id) {
            Some(team) if team.organization_id == organization_id => Ok(team),
            Some(_) => Err(DirectoryError::Conflict(format!(
                "team {team_id} does not belong to organization {organization_id}"
            ))),
            None => Err(DirectoryError::not_found("team", team_id)),
        }
    }

    fn membership_mut(
        &mut self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<&mut Membership, DirectoryError> {
        self.memberships
            .get_mut(&(user_id, organization_id))
            .ok_or_else(|| DirectoryError::not_found("membership", format!("{user_id}@{organization_id}")))
    }

    /// Memberships that occupy a seat (anything not removed).
    fn seat_count(&self, organization_id: OrganizationId) -> u32 {
        let n = self
            .memberships
            .values()
            .filter(|m| m.organization_id == organization_id && m.status != MembershipStatus::Removed)
            .count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }

    fn property_count(&self, organization_id: OrganizationId) -> u32 {
        let n = self
            .resources
            .iter()
            .filter(|((rt, _), r)| *rt == ResourceType::Property && r.organization_id == organization_id)
            .count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }
}

/// In-memory directory of users, organizations, teams, memberships and
/// resource scopes, for tests and local development.
///
/// Implements every collaborator store trait. Maintenance operations enforce
/// the same referential rules a relational schema would (memberships point at
/// existing users and organizations, teams stay inside their organization).
#[derive(Debug)]
pub struct InMemoryDirectory {
    inner: RwLock<Directory>,
    available: AtomicBool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Directory::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every call fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Directory>, StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("in-memory directory is offline"));
        }
        self.inner
            .read()
            .map_err(|_| StoreError::unavailable("in-memory directory lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Directory>, StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("in-memory directory is offline"));
        }
        self.inner
            .write()
            .map_err(|_| StoreError::unavailable("in-memory directory lock poisoned"))
    }

    pub fn add_user(&self, user: User) -> Result<(), DirectoryError> {
        let mut dir = self.write()?;
        if dir.users.contains_key(&user.id) {
            return Err(DirectoryError::Conflict(format!("user {} already exists", user.id)));
        }
        if dir.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(DirectoryError::Conflict(format!("email {} is taken", user.email)));
        }
        dir.users.insert(user.id, user);
        Ok(())
    }

    pub fn user(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&user_id).cloned())
    }

    /// Create an organization together with its owner's active
    /// `agent_owner` membership.
    pub fn create_organization(&self, organization: Organization) -> Result<Membership, DirectoryError> {
        let mut dir = self.write()?;
        if dir.organizations.contains_key(&organization.id) {
            return Err(DirectoryError::Conflict(format!(
                "organization {} already exists",
                organization.id
            )));
        }
        if !dir.users.contains_key(&organization.agent_owner_id) {
            return Err(DirectoryError::not_found("user", organization.agent_owner_id));
        }

        let owner = Membership::active(
            organization.agent_owner_id,
            organization.id,
            rentgate_auth::Role::AgentOwner,
        );
        dir.memberships
            .insert((owner.user_id, owner.organization_id), owner.clone());
        tracing::debug!(
            organization_id = %organization.id,
            owner_id = %organization.agent_owner_id,
            "organization created"
        );
        dir.organizations.insert(organization.id, organization);
        Ok(owner)
    }

    pub fn organization(&self, organization_id: OrganizationId) -> Result<Option<Organization>, StoreError> {
        Ok(self.read()?.organizations.get(&organization_id).cloned())
    }

    pub fn create_team(&self, team: Team) -> Result<(), DirectoryError> {
        let mut dir = self.write()?;
        dir.organization(team.organization_id)?;
        if dir.teams.contains_key(&team.id) {
            return Err(DirectoryError::Conflict(format!("team {} already exists", team.id)));
        }
        dir.teams.insert(team.id, team);
        Ok(())
    }

    /// Delete a team. Memberships and resources tagged with it become
    /// organization-global.
    pub fn remove_team(&self, organization_id: OrganizationId, team_id: TeamId) -> Result<(), DirectoryError> {
        let mut dir = self.write()?;
        dir.team_in(organization_id, team_id)?;
        dir.teams.remove(&team_id);

        for m in dir.memberships.values_mut() {
            if m.team_id == Some(team_id) {
                m.team_id = None;
            }
        }
        for r in dir.resources.values_mut() {
            if r.team_id == Some(team_id) {
                r.team_id = None;
            }
        }
        tracing::debug!(%organization_id, %team_id, "team removed; members and resources detached");
        Ok(())
    }

    /// Add a membership row (typically `invited` or `active`).
    pub fn add_member(&self, membership: Membership) -> Result<(), DirectoryError> {
        let mut dir = self.write()?;
        let org = dir.organization(membership.organization_id)?;
        let limits = org.limits;
        if !dir.users.contains_key(&membership.user_id) {
            return Err(DirectoryError::not_found("user", membership.user_id));
        }
        if let Some(team_id) = membership.team_id {
            dir.team_in(membership.organization_id, team_id)?;
        }
        let key = (membership.user_id, membership.organization_id);
        if dir.memberships.contains_key(&key) {
            return Err(DirectoryError::Conflict(format!(
                "user {} is already a member of {}",
                membership.user_id, membership.organization_id
            )));
        }
        if !limits.allows_more_members(dir.seat_count(membership.organization_id)) {
            return Err(DirectoryError::LimitReached("members"));
        }
        dir.memberships.insert(key, membership);
        Ok(())
    }

    pub fn set_member_status(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        next: MembershipStatus,
    ) -> Result<Membership, DirectoryError> {
        let mut dir = self.write()?;
        let membership = dir.membership_mut(user_id, organization_id)?;
        if !membership.status.can_transition_to(next) {
            return Err(DirectoryError::IllegalTransition {
                from: membership.status,
                to: next,
            });
        }
        membership.status = next;
        Ok(membership.clone())
    }

    pub fn set_member_role(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        role: impl Into<RoleName>,
    ) -> Result<Membership, DirectoryError> {
        let mut dir = self.write()?;
        let membership = dir.membership_mut(user_id, organization_id)?;
        membership.role = role.into();
        Ok(membership.clone())
    }

    /// Move a member into a team, or make them organization-global with `None`.
    pub fn assign_team(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        team_id: Option<TeamId>,
    ) -> Result<Membership, DirectoryError> {
        let mut dir = self.write()?;
        if let Some(team_id) = team_id {
            dir.team_in(organization_id, team_id)?;
        }
        let membership = dir.membership_mut(user_id, organization_id)?;
        membership.team_id = team_id;
        Ok(membership.clone())
    }

    /// Register (or replace) the scope row of a resource. A resource never
    /// moves between organizations.
    pub fn register_resource(
        &self,
        resource_type: ResourceType,
        resource_id: ResourceId,
        record: ScopeRecord,
    ) -> Result<(), DirectoryError> {
        let mut dir = self.write()?;
        let limits = dir.organization(record.organization_id)?.limits;
        if let Some(team_id) = record.team_id {
            dir.team_in(record.organization_id, team_id)?;
        }
        if let Some(property_id) = record.parent_property_id {
            match dir.resources.get(&(ResourceType::Property, property_id)) {
                Some(p) if p.organization_id == record.organization_id => {}
                Some(_) => {
                    return Err(DirectoryError::Conflict(format!(
                        "property {property_id} belongs to another organization"
                    )));
                }
                None => return Err(DirectoryError::not_found("property", property_id)),
            }
        }

        let key = (resource_type, resource_id);
        let existing = dir.resources.get(&key).map(|r| r.organization_id);
        if existing.is_some_and(|org| org != record.organization_id) {
            return Err(DirectoryError::Conflict(format!(
                "{resource_type} {resource_id} belongs to another organization"
            )));
        }
        let is_new_property = resource_type == ResourceType::Property && existing.is_none();
        if is_new_property && !limits.allows_more_properties(dir.property_count(record.organization_id)) {
            return Err(DirectoryError::LimitReached("properties"));
        }
        dir.resources.insert(key, record);
        Ok(())
    }

    /// Returns whether the resource existed.
    pub fn remove_resource(&self, resource_type: ResourceType, resource_id: ResourceId) -> Result<bool, StoreError> {
        Ok(self.write()?.resources.remove(&(resource_type, resource_id)).is_some())
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MembershipStore for InMemoryDirectory {
    #[instrument(level = "trace", skip(self), fields(user_id = %user_id, organization_id = %organization_id))]
    async fn find_membership(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self.read()?.memberships.get(&(user_id, organization_id)).cloned())
    }
}

#[async_trait]
impl ResourceScopeStore for InMemoryDirectory {
    #[instrument(level = "trace", skip(self), fields(resource_type = %resource_type, resource_id = %resource_id))]
    async fn scope_of(
        &self,
        resource_type: ResourceType,
        resource_id: ResourceId,
    ) -> Result<Option<ScopeRecord>, StoreError> {
        Ok(self.read()?.resources.get(&(resource_type, resource_id)).cloned())
    }
}

#[async_trait]
impl OrganizationStore for InMemoryDirectory {
    async fn owner_id_of(&self, organization_id: OrganizationId) -> Result<Option<UserId>, StoreError> {
        Ok(self
            .read()?
            .organizations
            .get(&organization_id)
            .map(|o| o.agent_owner_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentgate_auth::Role;
    use rentgate_core::SubscriptionLimits;

    fn user(email: &str) -> User {
        User::new(UserId::new(), email).unwrap()
    }

    fn seeded() -> (InMemoryDirectory, OrganizationId, User) {
        let dir = InMemoryDirectory::new();
        let owner = user("owner@example.com");
        dir.add_user(owner.clone()).unwrap();
        let org = OrganizationId::new();
        dir.create_organization(Organization::new(org, "Harbour Lettings", owner.id))
            .unwrap();
        (dir, org, owner)
    }

    #[tokio::test]
    async fn organization_creation_makes_owner_a_member() {
        let (dir, org, owner) = seeded();

        let membership = dir.find_membership(owner.id, org).await.unwrap().unwrap();
        assert_eq!(membership.role, RoleName::from(Role::AgentOwner));
        assert!(membership.is_active());
        assert_eq!(dir.owner_id_of(org).await.unwrap(), Some(owner.id));
    }

    #[test]
    fn organization_requires_existing_owner() {
        let dir = InMemoryDirectory::new();
        let err = dir
            .create_organization(Organization::new(OrganizationId::new(), "Ghost", UserId::new()))
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { kind: "user", .. }));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let (dir, _, _) = seeded();
        let err = dir.add_user(user("OWNER@example.com")).unwrap_err();
        assert!(matches!(err, DirectoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn removing_a_team_detaches_members_and_resources() {
        let (dir, org, _) = seeded();
        let team = Team::new(TeamId::new(), org, "North");
        let team_id = team.id;
        dir.create_team(team).unwrap();

        let agent = user("agent@example.com");
        dir.add_user(agent.clone()).unwrap();
        dir.add_member(Membership::active(agent.id, org, Role::Agent).in_team(team_id))
            .unwrap();
        let property = ResourceId::new();
        dir.register_resource(ResourceType::Property, property, ScopeRecord::new(org).with_team(team_id))
            .unwrap();

        dir.remove_team(org, team_id).unwrap();

        let membership = dir.find_membership(agent.id, org).await.unwrap().unwrap();
        assert_eq!(membership.team_id, None);
        let scope = dir.scope_of(ResourceType::Property, property).await.unwrap().unwrap();
        assert_eq!(scope.team_id, None);
    }

    #[test]
    fn team_from_another_organization_is_rejected() {
        let (dir, org, owner) = seeded();
        let other_org = OrganizationId::new();
        dir.create_organization(Organization::new(other_org, "Elsewhere", owner.id))
            .unwrap();
        let foreign = Team::new(TeamId::new(), other_org, "South");
        let foreign_id = foreign.id;
        dir.create_team(foreign).unwrap();

        let err = dir
            .register_resource(
                ResourceType::Property,
                ResourceId::new(),
                ScopeRecord::new(org).with_team(foreign_id),
            )
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Conflict(_)));
    }

    #[test]
    fn status_transitions_follow_lifecycle() {
        let (dir, org, _) = seeded();
        let invitee = user("new@example.com");
        dir.add_user(invitee.clone()).unwrap();
        dir.add_member(
            Membership::active(invitee.id, org, Role::Tenant).with_status(MembershipStatus::Invited),
        )
        .unwrap();

        let active = dir
            .set_member_status(invitee.id, org, MembershipStatus::Active)
            .unwrap();
        assert!(active.is_active());

        dir.set_member_status(invitee.id, org, MembershipStatus::Removed)
            .unwrap();
        let err = dir
            .set_member_status(invitee.id, org, MembershipStatus::Active)
            .unwrap_err();
        assert_eq!(
            err,
            DirectoryError::IllegalTransition {
                from: MembershipStatus::Removed,
                to: MembershipStatus::Active
            }
        );
    }

    #[test]
    fn subscription_limits_are_enforced() {
        let dir = InMemoryDirectory::new();
        let owner = user("owner@example.com");
        dir.add_user(owner.clone()).unwrap();
        let org = OrganizationId::new();
        dir.create_organization(
            Organization::new(org, "Small Agency", owner.id).with_limits(SubscriptionLimits {
                max_properties: Some(1),
                max_members: Some(1),
            }),
        )
        .unwrap();

        let agent = user("agent@example.com");
        dir.add_user(agent.clone()).unwrap();
        assert_eq!(
            dir.add_member(Membership::active(agent.id, org, Role::Agent)),
            Err(DirectoryError::LimitReached("members"))
        );

        let first = ResourceId::new();
        dir.register_resource(ResourceType::Property, first, ScopeRecord::new(org))
            .unwrap();
        // Re-registering an existing property is an update, not a new seat.
        dir.register_resource(ResourceType::Property, first, ScopeRecord::new(org).with_owner(owner.id))
            .unwrap();
        assert_eq!(
            dir.register_resource(ResourceType::Property, ResourceId::new(), ScopeRecord::new(org)),
            Err(DirectoryError::LimitReached("properties"))
        );
    }

    #[test]
    fn resources_cannot_move_between_organizations() {
        let dir = InMemoryDirectory::new();
        let owner = user("owner@example.com");
        dir.add_user(owner.clone()).unwrap();

        let home = OrganizationId::new();
        let full = OrganizationId::new();
        dir.create_organization(Organization::new(home, "Home Agency", owner.id))
            .unwrap();
        dir.create_organization(
            Organization::new(full, "Full Agency", owner.id).with_limits(SubscriptionLimits {
                max_properties: Some(1),
                max_members: None,
            }),
        )
        .unwrap();
        dir.register_resource(ResourceType::Property, ResourceId::new(), ScopeRecord::new(full))
            .unwrap();

        let property = ResourceId::new();
        dir.register_resource(ResourceType::Property, property, ScopeRecord::new(home))
            .unwrap();

        assert!(matches!(
            dir.register_resource(ResourceType::Property, property, ScopeRecord::new(full)),
            Err(DirectoryError::Conflict(_))
        ));
        assert_eq!(dir.read().unwrap().property_count(full), 1);
        assert_eq!(
            dir.read().unwrap().resources[&(ResourceType::Property, property)].organization_id,
            home
        );
    }

    #[test]
    fn child_resource_needs_a_parent_property() {
        let (dir, org, _) = seeded();
        let err = dir
            .register_resource(
                ResourceType::Lease,
                ResourceId::new(),
                ScopeRecord::new(org).under_property(ResourceId::new()),
            )
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { kind: "property", .. }));
    }

    #[tokio::test]
    async fn offline_directory_reports_unavailable() {
        let (dir, org, owner) = seeded();
        dir.set_available(false);

        let err = dir.find_membership(owner.id, org).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(matches!(dir.add_user(user("x@example.com")), Err(DirectoryError::Store(_))));

        dir.set_available(true);
        assert!(dir.find_membership(owner.id, org).await.unwrap().is_some());
    }
}
