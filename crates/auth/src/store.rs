//! Collaborator store contracts.
//!
//! The authorization core never talks to a database directly. Hosts implement
//! these traits over their persistence layer (see `rentgate-infra`).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use rentgate_core::{OrganizationId, ResourceId, UserId};

use crate::error::StoreError;
use crate::membership::Membership;
use crate::scope::ScopeRecord;
use crate::statements::ResourceType;

/// Membership lookup.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// The unique membership row for `(user, organization)` in any status.
    async fn find_membership(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<Option<Membership>, StoreError>;
}

/// Resource scope lookup. `Ok(None)` means the resource does not exist.
#[async_trait]
pub trait ResourceScopeStore: Send + Sync {
    async fn scope_of(
        &self,
        resource_type: ResourceType,
        resource_id: ResourceId,
    ) -> Result<Option<ScopeRecord>, StoreError>;
}

/// Organization ownership lookup. `Ok(None)` means the organization does not exist.
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn owner_id_of(&self, organization_id: OrganizationId) -> Result<Option<UserId>, StoreError>;
}

#[async_trait]
impl<S> MembershipStore for Arc<S>
where
    S: MembershipStore + ?Sized,
{
    async fn find_membership(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<Option<Membership>, StoreError> {
        (**self).find_membership(user_id, organization_id).await
    }
}

#[async_trait]
impl<S> ResourceScopeStore for Arc<S>
where
    S: ResourceScopeStore + ?Sized,
{
    async fn scope_of(
        &self,
        resource_type: ResourceType,
        resource_id: ResourceId,
    ) -> Result<Option<ScopeRecord>, StoreError> {
        (**self).scope_of(resource_type, resource_id).await
    }
}

#[async_trait]
impl<S> OrganizationStore for Arc<S>
where
    S: OrganizationStore + ?Sized,
{
    async fn owner_id_of(&self, organization_id: OrganizationId) -> Result<Option<UserId>, StoreError> {
        (**self).owner_id_of(organization_id).await
    }
}

/// Run a store lookup under a deadline; an elapsed deadline is a store error.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    timeout: Duration,
    lookup: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, lookup).await {
        Ok(result) => result,
        Err(_) => {
            let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(operation, millis, "store lookup timed out");
            Err(StoreError::Timeout { operation, millis })
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Fixed-answer store for unit tests.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct StaticStore {
        memberships: Vec<Membership>,
        scopes: HashMap<(ResourceType, ResourceId), ScopeRecord>,
        owners: HashMap<OrganizationId, UserId>,
        unavailable: bool,
        any_membership: bool,
        delay: Option<Duration>,
    }

    impl StaticStore {
        pub(crate) fn unavailable() -> Self {
            Self {
                unavailable: true,
                ..Default::default()
            }
        }

        pub(crate) fn with_membership(mut self, membership: Membership) -> Self {
            self.memberships.push(membership);
            self
        }

        pub(crate) fn with_scope(
            mut self,
            resource_type: ResourceType,
            resource_id: ResourceId,
            record: ScopeRecord,
        ) -> Self {
            self.scopes.insert((resource_type, resource_id), record);
            self
        }

        pub(crate) fn with_owner(mut self, organization_id: OrganizationId, owner: UserId) -> Self {
            self.owners.insert(organization_id, owner);
            self
        }

        /// Return the first membership row regardless of the requested key.
        pub(crate) fn answering_any_membership(mut self) -> Self {
            self.any_membership = true;
            self
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        async fn gate(&self) -> Result<(), StoreError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.unavailable {
                return Err(StoreError::unavailable("static store is down"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MembershipStore for StaticStore {
        async fn find_membership(
            &self,
            user_id: UserId,
            organization_id: OrganizationId,
        ) -> Result<Option<Membership>, StoreError> {
            self.gate().await?;
            if self.any_membership {
                return Ok(self.memberships.first().cloned());
            }
            Ok(self
                .memberships
                .iter()
                .find(|m| m.user_id == user_id && m.organization_id == organization_id)
                .cloned())
        }
    }

    #[async_trait]
    impl ResourceScopeStore for StaticStore {
        async fn scope_of(
            &self,
            resource_type: ResourceType,
            resource_id: ResourceId,
        ) -> Result<Option<ScopeRecord>, StoreError> {
            self.gate().await?;
            Ok(self.scopes.get(&(resource_type, resource_id)).cloned())
        }
    }

    #[async_trait]
    impl OrganizationStore for StaticStore {
        async fn owner_id_of(&self, organization_id: OrganizationId) -> Result<Option<UserId>, StoreError> {
            self.gate().await?;
            Ok(self.owners.get(&organization_id).copied())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_lookup_times_out() {
        let store = StaticStore::default().with_delay(Duration::from_secs(10));
        let err = bounded(
            "find_membership",
            Duration::from_millis(50),
            store.find_membership(UserId::new(), OrganizationId::new()),
        )
        .await
        .unwrap_err();

        assert_eq!(
            err,
            StoreError::Timeout {
                operation: "find_membership",
                millis: 50
            }
        );
    }

    #[tokio::test]
    async fn arc_wrapped_store_delegates() {
        let org = OrganizationId::new();
        let owner = UserId::new();
        let store: Arc<dyn OrganizationStore> = Arc::new(StaticStore::default().with_owner(org, owner));
        assert_eq!(store.owner_id_of(org).await.unwrap(), Some(owner));
    }
}
