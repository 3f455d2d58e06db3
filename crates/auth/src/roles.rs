//! Role catalog: named, immutable bundles of statements.
//!
//! Roles are a closed set. Each role's grants are composed once at load time
//! (set union/subtraction over the statement registry) and validated against
//! the registry; nothing is resolved or mutated per request.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rentgate_core::DomainError;

use crate::statements::{Action, ResourceType, Statement, StatementRegistry};

/// Version of the built-in role catalog. Bump on every grant change so
/// client-side mirrors can detect drift.
pub const CATALOG_VERSION: u32 = 4;

/// Role name as stored on a membership record.
///
/// Kept opaque at this layer: a stored name that is not in the catalog is a
/// deny (`unknown_role`), not a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

impl RoleName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve to a catalog role, if the name is known.
    pub fn role(&self) -> Option<Role> {
        self.as_str().parse().ok()
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for RoleName {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<Role> for RoleName {
    fn from(role: Role) -> Self {
        Self::new(role.as_str())
    }
}

/// Organization membership roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The agency owner; every statement in the registry.
    AgentOwner,
    Manager,
    Agent,
    /// Landlord with read-only visibility into their portfolio.
    PropertyOwner,
    Caretaker,
    Tenant,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::AgentOwner,
        Role::Manager,
        Role::Agent,
        Role::PropertyOwner,
        Role::Caretaker,
        Role::Tenant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AgentOwner => "agent_owner",
            Role::Manager => "manager",
            Role::Agent => "agent",
            Role::PropertyOwner => "property_owner",
            Role::Caretaker => "caretaker",
            Role::Tenant => "tenant",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::AgentOwner => "Agency owner with every permission in the organization",
            Role::Manager => "Operations manager; everything except organization ownership",
            Role::Agent => "Letting agent handling properties, tenants and leases",
            Role::PropertyOwner => "Landlord with read-only access to their portfolio",
            Role::Caretaker => "On-site caretaker handling maintenance",
            Role::Tenant => "Resident with access to their own lease and requests",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::unknown_name("role", s))
    }
}

/// Resource type → permitted actions.
pub type Grants = BTreeMap<ResourceType, BTreeSet<Action>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("role '{role}' grants '{statement}', which is not in the statement registry")]
    UnknownStatement { role: Role, statement: Statement },

    #[error("role '{0}' is defined more than once")]
    DuplicateRole(Role),

    #[error("role '{0}' has no definition")]
    MissingRole(Role),
}

/// Grant composition used to define roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantSet {
    grants: Grants,
}

impl GrantSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every statement in the registry.
    pub fn everything(registry: &StatementRegistry) -> Self {
        let mut set = Self::empty();
        for stmt in registry.statements() {
            set.grants.entry(stmt.resource_type).or_default().insert(stmt.action);
        }
        set
    }

    pub fn allow(mut self, resource_type: ResourceType, actions: &[Action]) -> Self {
        self.grants
            .entry(resource_type)
            .or_default()
            .extend(actions.iter().copied());
        self
    }

    pub fn deny(mut self, resource_type: ResourceType, actions: &[Action]) -> Self {
        if let Some(set) = self.grants.get_mut(&resource_type) {
            for action in actions {
                set.remove(action);
            }
            if set.is_empty() {
                self.grants.remove(&resource_type);
            }
        }
        self
    }

    pub fn deny_resource(mut self, resource_type: ResourceType) -> Self {
        self.grants.remove(&resource_type);
        self
    }

    pub fn union(mut self, other: &GrantSet) -> Self {
        for (rt, actions) in &other.grants {
            self.grants.entry(*rt).or_default().extend(actions.iter().copied());
        }
        self
    }

    fn statements(&self) -> impl Iterator<Item = Statement> + '_ {
        self.grants
            .iter()
            .flat_map(|(rt, acts)| acts.iter().map(move |a| Statement::new(*rt, *a)))
    }

    pub fn into_grants(self) -> Grants {
        self.grants
    }
}

/// The built-in role definitions.
///
/// Lesser roles are narrowed from broader ones so that a statement added to
/// the registry reaches `agent_owner` without touching this function.
pub fn standard_definitions(registry: &StatementRegistry) -> Vec<(Role, GrantSet)> {
    use Action::*;
    use ResourceType as R;

    let owner = GrantSet::everything(registry);

    let manager = owner
        .clone()
        .deny(R::Organization, &[Delete, Manage])
        .deny(R::Settings, &[Update]);

    let viewer = GrantSet::empty()
        .allow(R::Property, &[Read])
        .allow(R::Lease, &[Read])
        .allow(R::Payment, &[Read])
        .allow(R::Document, &[Read])
        .allow(R::Organization, &[Read]);

    let agent = viewer
        .clone()
        .allow(R::Property, &[Create, Update, Assign])
        .allow(R::Tenant, &[Create, Read, Update, Contact])
        .allow(R::Lease, &[Create, Update, Terminate])
        .allow(R::Payment, &[Create])
        .allow(R::Maintenance, &[Create, Read, Update, Assign])
        .allow(R::Document, &[Create, Update])
        .allow(R::Report, &[Read])
        .allow(R::Team, &[Read])
        .allow(R::Member, &[Read]);

    let property_owner = viewer.allow(R::Report, &[Read, Export]);

    let caretaker = GrantSet::empty()
        .allow(R::Property, &[Read])
        .allow(R::Tenant, &[Read, Contact])
        .allow(R::Maintenance, &[Read, Update, Create, Complete]);

    let tenant = GrantSet::empty()
        .allow(R::Lease, &[Read])
        .allow(R::Payment, &[Read, Create])
        .allow(R::Maintenance, &[Create, Read])
        .allow(R::Document, &[Read]);

    vec![
        (Role::AgentOwner, owner),
        (Role::Manager, manager),
        (Role::Agent, agent),
        (Role::PropertyOwner, property_owner),
        (Role::Caretaker, caretaker),
        (Role::Tenant, tenant),
    ]
}

/// Immutable, validated role → grants table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCatalog {
    roles: BTreeMap<Role, Grants>,
    empty: BTreeSet<Action>,
}

impl RoleCatalog {
    /// Build the built-in catalog against the standard registry.
    ///
    /// Call once at startup; an error here is a fatal configuration bug.
    pub fn standard() -> Result<Self, CatalogError> {
        let registry = StatementRegistry::standard();
        Self::load(registry, standard_definitions(registry))
    }

    /// Validate role definitions against a registry.
    ///
    /// Every role in [`Role::ALL`] must be defined exactly once and every
    /// granted statement must exist in `registry`.
    pub fn load(
        registry: &StatementRegistry,
        definitions: Vec<(Role, GrantSet)>,
    ) -> Result<Self, CatalogError> {
        let mut roles = BTreeMap::new();
        for (role, set) in definitions {
            if let Some(statement) = set.statements().find(|s| !registry.contains(s)) {
                return Err(CatalogError::UnknownStatement { role, statement });
            }
            if roles.insert(role, set.into_grants()).is_some() {
                return Err(CatalogError::DuplicateRole(role));
            }
        }
        if let Some(missing) = Role::ALL.into_iter().find(|r| !roles.contains_key(r)) {
            return Err(CatalogError::MissingRole(missing));
        }

        tracing::debug!(version = CATALOG_VERSION, roles = roles.len(), "role catalog loaded");
        Ok(Self {
            roles,
            empty: BTreeSet::new(),
        })
    }

    /// Grants for a stored role name; `None` for names outside the catalog.
    pub fn grants_for(&self, role_name: &str) -> Option<&Grants> {
        let role: Role = role_name.parse().ok()?;
        self.grants_for_role(role)
    }

    pub fn grants_for_role(&self, role: Role) -> Option<&Grants> {
        self.roles.get(&role)
    }

    /// Actions a role holds on one resource type.
    pub fn actions_granted(&self, role: Role, resource_type: ResourceType) -> &BTreeSet<Action> {
        self.roles
            .get(&role)
            .and_then(|g| g.get(&resource_type))
            .unwrap_or(&self.empty)
    }

    pub fn role_grants(&self, role: Role, resource_type: ResourceType, action: Action) -> bool {
        self.actions_granted(role, resource_type).contains(&action)
    }

    /// Serializable view of the whole catalog (client UI mirror, audits).
    pub fn snapshot(&self, registry: &StatementRegistry) -> CatalogSnapshot {
        let statements = registry.statements().map(|s| s.to_string()).collect();
        let roles = self
            .roles
            .iter()
            .map(|(role, grants)| RoleDefinition {
                name: role.as_str().to_string(),
                description: role.description().to_string(),
                grants: grants
                    .iter()
                    .map(|(rt, acts)| {
                        (
                            rt.as_str().to_string(),
                            acts.iter().map(|a| a.as_str().to_string()).collect(),
                        )
                    })
                    .collect(),
            })
            .collect();

        CatalogSnapshot {
            version: CATALOG_VERSION,
            statements,
            roles,
        }
    }
}

/// Role definition with its grants (for audit/display).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    pub description: String,
    pub grants: BTreeMap<String, Vec<String>>,
}

/// Complete, versioned view of the registry and catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub version: u32,
    pub statements: Vec<String>,
    pub roles: Vec<RoleDefinition>,
}
