//! Resource scope index: where a resource sits in organization → team → owner.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use rentgate_core::{OrganizationId, ResourceId, TeamId, UserId};

use crate::error::StoreError;
use crate::statements::ResourceType;
use crate::store::{bounded, ResourceScopeStore};

/// Scope facts the evaluator needs about one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceScope {
    pub organization_id: OrganizationId,
    pub team_id: Option<TeamId>,
    pub owner_id: Option<UserId>,
    pub caretaker_id: Option<UserId>,
}

impl ResourceScope {
    /// Organization-wide scope with no team, owner or caretaker.
    pub fn organization(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            team_id: None,
            owner_id: None,
            caretaker_id: None,
        }
    }

    pub fn with_team(mut self, team_id: Option<TeamId>) -> Self {
        self.team_id = team_id;
        self
    }

    pub fn owned_by(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn caretaken_by(mut self, caretaker_id: UserId) -> Self {
        self.caretaker_id = Some(caretaker_id);
        self
    }

    /// Whether `user_id` is the owner or caretaker of the resource.
    pub fn is_owned_or_caretaken_by(&self, user_id: UserId) -> bool {
        self.owner_id == Some(user_id) || self.caretaker_id == Some(user_id)
    }
}

/// Raw scope row as returned by a [`ResourceScopeStore`].
///
/// Resources that only reference a team through their property (leases,
/// payments, maintenance requests, ...) leave `team_id` empty and set
/// `parent_property_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRecord {
    pub organization_id: OrganizationId,
    pub team_id: Option<TeamId>,
    pub owner_id: Option<UserId>,
    pub caretaker_id: Option<UserId>,
    pub parent_property_id: Option<ResourceId>,
}

impl ScopeRecord {
    pub fn new(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            team_id: None,
            owner_id: None,
            caretaker_id: None,
            parent_property_id: None,
        }
    }

    pub fn with_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn with_owner(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_caretaker(mut self, caretaker_id: UserId) -> Self {
        self.caretaker_id = Some(caretaker_id);
        self
    }

    pub fn under_property(mut self, property_id: ResourceId) -> Self {
        self.parent_property_id = Some(property_id);
        self
    }

    fn into_scope(self) -> ResourceScope {
        ResourceScope {
            organization_id: self.organization_id,
            team_id: self.team_id,
            owner_id: self.owner_id,
            caretaker_id: self.caretaker_id,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("{resource_type} {resource_id} not found")]
    NotFound {
        resource_type: ResourceType,
        resource_id: ResourceId,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves a resource to its [`ResourceScope`], climbing to the parent
/// property for the team tag when the resource has none of its own.
#[derive(Debug, Clone)]
pub struct ResourceScopeIndex<S> {
    store: S,
    timeout: Duration,
}

impl<S: ResourceScopeStore> ResourceScopeIndex<S> {
    pub fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(
        level = "debug",
        skip(self),
        fields(resource_type = %resource_type, resource_id = %resource_id)
    )]
    pub async fn scope_of(
        &self,
        resource_type: ResourceType,
        resource_id: ResourceId,
    ) -> Result<ResourceScope, ScopeError> {
        let record = self
            .lookup(resource_type, resource_id)
            .await?
            .ok_or(ScopeError::NotFound {
                resource_type,
                resource_id,
            })?;

        let parent = match (resource_type, record.team_id, record.parent_property_id) {
            (ResourceType::Property, _, _) | (_, Some(_), _) | (_, None, None) => None,
            (_, None, Some(property_id)) => Some(property_id),
        };

        let Some(property_id) = parent else {
            return Ok(record.into_scope());
        };

        // An orphaned child cannot be placed in a team; fail closed.
        let Some(property) = self.lookup(ResourceType::Property, property_id).await? else {
            tracing::warn!(
                %resource_type,
                %resource_id,
                %property_id,
                "parent property missing; treating resource as not found"
            );
            return Err(ScopeError::NotFound {
                resource_type,
                resource_id,
            });
        };

        if property.organization_id != record.organization_id {
            return Err(ScopeError::Store(StoreError::Corrupt(format!(
                "{resource_type} {resource_id} belongs to {} but its property {property_id} belongs to {}",
                record.organization_id, property.organization_id
            ))));
        }

        let team_id = property.team_id;
        Ok(record.into_scope().with_team(team_id))
    }

    async fn lookup(
        &self,
        resource_type: ResourceType,
        resource_id: ResourceId,
    ) -> Result<Option<ScopeRecord>, StoreError> {
        bounded(
            "scope_of",
            self.timeout,
            self.store.scope_of(resource_type, resource_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::StaticStore;

    fn index(store: StaticStore) -> ResourceScopeIndex<StaticStore> {
        ResourceScopeIndex::new(store, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn property_scope_is_returned_as_stored() {
        let org = OrganizationId::new();
        let team = TeamId::new();
        let caretaker = UserId::new();
        let property = ResourceId::new();
        let store = StaticStore::default().with_scope(
            ResourceType::Property,
            property,
            ScopeRecord::new(org).with_team(team).with_caretaker(caretaker),
        );

        let scope = index(store).scope_of(ResourceType::Property, property).await.unwrap();
        assert_eq!(scope.organization_id, org);
        assert_eq!(scope.team_id, Some(team));
        assert!(scope.is_owned_or_caretaken_by(caretaker));
    }

    #[tokio::test]
    async fn untagged_child_inherits_property_team() {
        let org = OrganizationId::new();
        let team = TeamId::new();
        let property = ResourceId::new();
        let lease = ResourceId::new();
        let store = StaticStore::default()
            .with_scope(ResourceType::Property, property, ScopeRecord::new(org).with_team(team))
            .with_scope(ResourceType::Lease, lease, ScopeRecord::new(org).under_property(property));

        let scope = index(store).scope_of(ResourceType::Lease, lease).await.unwrap();
        assert_eq!(scope.team_id, Some(team));
        assert_eq!(scope.owner_id, None);
    }

    #[tokio::test]
    async fn own_team_tag_wins_over_property() {
        let org = OrganizationId::new();
        let property = ResourceId::new();
        let doc = ResourceId::new();
        let own_team = TeamId::new();
        let store = StaticStore::default()
            .with_scope(
                ResourceType::Property,
                property,
                ScopeRecord::new(org).with_team(TeamId::new()),
            )
            .with_scope(
                ResourceType::Document,
                doc,
                ScopeRecord::new(org).with_team(own_team).under_property(property),
            );

        let scope = index(store).scope_of(ResourceType::Document, doc).await.unwrap();
        assert_eq!(scope.team_id, Some(own_team));
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let id = ResourceId::new();
        let err = index(StaticStore::default())
            .scope_of(ResourceType::Payment, id)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ScopeError::NotFound {
                resource_type: ResourceType::Payment,
                resource_id: id
            }
        );
    }

    #[tokio::test]
    async fn orphaned_child_is_not_found() {
        let org = OrganizationId::new();
        let payment = ResourceId::new();
        let store = StaticStore::default().with_scope(
            ResourceType::Payment,
            payment,
            ScopeRecord::new(org).under_property(ResourceId::new()),
        );

        let err = index(store).scope_of(ResourceType::Payment, payment).await.unwrap_err();
        assert!(matches!(err, ScopeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn cross_organization_parent_is_corrupt() {
        let property = ResourceId::new();
        let lease = ResourceId::new();
        let store = StaticStore::default()
            .with_scope(
                ResourceType::Property,
                property,
                ScopeRecord::new(OrganizationId::new()),
            )
            .with_scope(
                ResourceType::Lease,
                lease,
                ScopeRecord::new(OrganizationId::new()).under_property(property),
            );

        let err = index(store).scope_of(ResourceType::Lease, lease).await.unwrap_err();
        assert!(matches!(err, ScopeError::Store(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn outage_is_a_store_error() {
        let err = index(StaticStore::unavailable())
            .scope_of(ResourceType::Property, ResourceId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScopeError::Store(StoreError::Unavailable(_))));
    }
}
