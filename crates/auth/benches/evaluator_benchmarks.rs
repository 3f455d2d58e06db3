use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use async_trait::async_trait;
use rentgate_auth::{
    Action, AuthorizationGate, EvaluationContext, GateConfig, Membership, MembershipStore,
    OrganizationStore, PermissionEvaluator, ResourceScope, ResourceScopeStore, ResourceType, Role,
    RoleCatalog, ScopeRecord, StoreError, Subject,
};
use rentgate_core::{OrganizationId, ResourceId, TeamId, User, UserId};
use std::collections::HashMap;
use std::sync::Arc;

/// Map-backed store answering every lookup immediately.
#[derive(Debug, Clone, Default)]
struct MapStore {
    memberships: HashMap<(UserId, OrganizationId), Membership>,
    scopes: HashMap<(ResourceType, ResourceId), ScopeRecord>,
    owners: HashMap<OrganizationId, UserId>,
}

#[async_trait]
impl MembershipStore for MapStore {
    async fn find_membership(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self.memberships.get(&(user_id, organization_id)).cloned())
    }
}

#[async_trait]
impl ResourceScopeStore for MapStore {
    async fn scope_of(
        &self,
        resource_type: ResourceType,
        resource_id: ResourceId,
    ) -> Result<Option<ScopeRecord>, StoreError> {
        Ok(self.scopes.get(&(resource_type, resource_id)).cloned())
    }
}

#[async_trait]
impl OrganizationStore for MapStore {
    async fn owner_id_of(&self, organization_id: OrganizationId) -> Result<Option<UserId>, StoreError> {
        Ok(self.owners.get(&organization_id).copied())
    }
}

fn catalog() -> Arc<RoleCatalog> {
    Arc::new(RoleCatalog::standard().unwrap())
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    group.throughput(Throughput::Elements(1));

    let evaluator = PermissionEvaluator::new(catalog());
    let org = OrganizationId::new();
    let team = TeamId::new();

    for role in Role::ALL {
        let user = User::new(UserId::new(), "bench@example.com").unwrap();
        let subject = Subject::new(&user, org)
            .with_membership(Some(Membership::active(user.id, org, role).in_team(team)))
            .with_organization_owner(Some(UserId::new()));
        let scope = ResourceScope::organization(org).with_team(Some(team));

        group.bench_with_input(BenchmarkId::new("role_grant", role), &subject, |b, subject| {
            b.iter(|| {
                evaluator.evaluate(
                    black_box(subject),
                    black_box(Action::Update),
                    black_box(ResourceType::Maintenance),
                    &scope,
                )
            });
        });
    }

    group.finish();
}

fn bench_gate_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate_check");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let org = OrganizationId::new();
    let team = TeamId::new();
    let user = User::new(UserId::new(), "agent@example.com").unwrap();
    let property = ResourceId::new();
    let lease = ResourceId::new();

    let mut store = MapStore::default();
    store
        .memberships
        .insert((user.id, org), Membership::active(user.id, org, Role::Agent).in_team(team));
    store.owners.insert(org, UserId::new());
    store
        .scopes
        .insert((ResourceType::Property, property), ScopeRecord::new(org).with_team(team));
    store.scopes.insert(
        (ResourceType::Lease, lease),
        ScopeRecord::new(org).under_property(property),
    );
    let store = Arc::new(store);

    let gate = AuthorizationGate::new(
        catalog(),
        store.clone(),
        store.clone(),
        store,
        GateConfig::default(),
    );

    // Fresh context per iteration: every lookup runs.
    group.bench_function("cold_context", |b| {
        b.iter(|| {
            let ctx = EvaluationContext::new(&user, org);
            runtime
                .block_on(gate.check(&ctx, ResourceType::Lease, Action::Update, Some(lease)))
                .unwrap()
        });
    });

    // Shared context: membership is memoised after the first check.
    group.bench_function("warm_context", |b| {
        let ctx = EvaluationContext::new(&user, org);
        b.iter(|| {
            runtime
                .block_on(gate.check(&ctx, ResourceType::Lease, Action::Update, Some(lease)))
                .unwrap()
        });
    });

    group.bench_function("permitted_actions", |b| {
        let ctx = EvaluationContext::new(&user, org);
        b.iter(|| {
            runtime
                .block_on(gate.permitted_actions(&ctx, ResourceType::Property, Some(property)))
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_gate_check);
criterion_main!(benches);
