//! Statement registry: the fixed catalog of resource types and their actions.
//!
//! A statement is a single `(resource type, action)` capability unit, written
//! `resource:action` (e.g. `"property:read"`). The table below is code, not
//! data: changing it is a reviewed change, never a runtime edit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use rentgate_core::DomainError;

/// Resource types known to the authorization core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Property,
    Tenant,
    Lease,
    Payment,
    Maintenance,
    Report,
    Settings,
    Document,
    Team,
    Member,
    Organization,
    Invitation,
}

impl ResourceType {
    pub const ALL: [ResourceType; 12] = [
        ResourceType::Property,
        ResourceType::Tenant,
        ResourceType::Lease,
        ResourceType::Payment,
        ResourceType::Maintenance,
        ResourceType::Report,
        ResourceType::Settings,
        ResourceType::Document,
        ResourceType::Team,
        ResourceType::Member,
        ResourceType::Organization,
        ResourceType::Invitation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Property => "property",
            ResourceType::Tenant => "tenant",
            ResourceType::Lease => "lease",
            ResourceType::Payment => "payment",
            ResourceType::Maintenance => "maintenance",
            ResourceType::Report => "report",
            ResourceType::Settings => "settings",
            ResourceType::Document => "document",
            ResourceType::Team => "team",
            ResourceType::Member => "member",
            ResourceType::Organization => "organization",
            ResourceType::Invitation => "invitation",
        }
    }
}

impl core::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|rt| rt.as_str() == s)
            .ok_or_else(|| DomainError::unknown_name("resource type", s))
    }
}

/// Actions a statement can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Assign,
    Contact,
    Complete,
    Terminate,
    Refund,
    Export,
    Manage,
    Cancel,
}

impl Action {
    pub const ALL: [Action; 12] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Assign,
        Action::Contact,
        Action::Complete,
        Action::Terminate,
        Action::Refund,
        Action::Export,
        Action::Manage,
        Action::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Assign => "assign",
            Action::Contact => "contact",
            Action::Complete => "complete",
            Action::Terminate => "terminate",
            Action::Refund => "refund",
            Action::Export => "export",
            Action::Manage => "manage",
            Action::Cancel => "cancel",
        }
    }

    /// Actions that ownership bypass may grant (`read`/`contact` class).
    pub fn is_read_class(&self) -> bool {
        matches!(self, Action::Read | Action::Contact)
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| DomainError::unknown_name("action", s))
    }
}

/// A single `(resource type, action)` capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Statement {
    pub resource_type: ResourceType,
    pub action: Action,
}

impl Statement {
    pub const fn new(resource_type: ResourceType, action: Action) -> Self {
        Self {
            resource_type,
            action,
        }
    }
}

impl core::fmt::Display for Statement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.action)
    }
}

impl FromStr for Statement {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rt, action) = s
            .split_once(':')
            .ok_or_else(|| DomainError::validation(format!("statement '{s}' is not 'resource:action'")))?;
        Ok(Self::new(rt.parse()?, action.parse()?))
    }
}

use Action::*;

/// The fixed statement table.
const STATEMENT_TABLE: &[(ResourceType, &[Action])] = &[
    (ResourceType::Property, &[Create, Read, Update, Delete, Assign]),
    (ResourceType::Tenant, &[Create, Read, Update, Delete, Contact]),
    (ResourceType::Lease, &[Create, Read, Update, Delete, Terminate]),
    (ResourceType::Payment, &[Create, Read, Update, Delete, Refund]),
    (ResourceType::Maintenance, &[Create, Read, Update, Delete, Assign, Complete]),
    (ResourceType::Report, &[Read, Export]),
    (ResourceType::Settings, &[Read, Update]),
    (ResourceType::Document, &[Create, Read, Update, Delete]),
    (ResourceType::Team, &[Create, Read, Update, Delete, Manage]),
    (ResourceType::Member, &[Create, Read, Update, Delete, Manage]),
    (ResourceType::Organization, &[Read, Update, Delete, Manage]),
    (ResourceType::Invitation, &[Create, Read, Cancel]),
];

static STANDARD: LazyLock<StatementRegistry> =
    LazyLock::new(|| StatementRegistry::from_table(STATEMENT_TABLE));

/// Read-only registry of every valid statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRegistry {
    actions: BTreeMap<ResourceType, BTreeSet<Action>>,
    empty: BTreeSet<Action>,
}

impl StatementRegistry {
    /// The process-wide registry built from the fixed table.
    pub fn standard() -> &'static StatementRegistry {
        &STANDARD
    }

    pub fn from_table(table: &[(ResourceType, &[Action])]) -> Self {
        let mut actions: BTreeMap<ResourceType, BTreeSet<Action>> = BTreeMap::new();
        for (rt, acts) in table {
            actions.entry(*rt).or_default().extend(acts.iter().copied());
        }
        Self {
            actions,
            empty: BTreeSet::new(),
        }
    }

    /// Actions defined for a resource type (empty if the type is not registered).
    pub fn actions_for(&self, resource_type: ResourceType) -> &BTreeSet<Action> {
        self.actions.get(&resource_type).unwrap_or(&self.empty)
    }

    pub fn is_valid_action(&self, resource_type: ResourceType, action: Action) -> bool {
        self.actions_for(resource_type).contains(&action)
    }

    pub fn contains(&self, statement: &Statement) -> bool {
        self.is_valid_action(statement.resource_type, statement.action)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = ResourceType> + '_ {
        self.actions.keys().copied()
    }

    /// Every registered statement, ordered by resource type then action.
    pub fn statements(&self) -> impl Iterator<Item = Statement> + '_ {
        self.actions
            .iter()
            .flat_map(|(rt, acts)| acts.iter().map(move |a| Statement::new(*rt, *a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_covers_every_resource_type() {
        let registry = StatementRegistry::standard();
        for rt in ResourceType::ALL {
            assert!(
                !registry.actions_for(rt).is_empty(),
                "{rt} has no registered actions"
            );
        }
    }

    #[test]
    fn property_actions_match_the_catalog() {
        let registry = StatementRegistry::standard();
        let actions: Vec<_> = registry.actions_for(ResourceType::Property).iter().copied().collect();
        assert_eq!(actions, vec![Create, Read, Update, Delete, Assign]);
    }

    #[test]
    fn unsupported_actions_are_invalid() {
        let registry = StatementRegistry::standard();
        assert!(registry.is_valid_action(ResourceType::Report, Export));
        assert!(!registry.is_valid_action(ResourceType::Report, Delete));
        assert!(!registry.is_valid_action(ResourceType::Settings, Create));
    }

    #[test]
    fn unregistered_type_has_no_actions() {
        let registry = StatementRegistry::from_table(&[(ResourceType::Property, &[Read])]);
        assert!(registry.actions_for(ResourceType::Lease).is_empty());
        assert!(!registry.is_valid_action(ResourceType::Lease, Read));
    }

    #[test]
    fn statement_parses_and_displays() {
        let stmt: Statement = "maintenance:complete".parse().unwrap();
        assert_eq!(stmt, Statement::new(ResourceType::Maintenance, Complete));
        assert_eq!(stmt.to_string(), "maintenance:complete");

        assert!("maintenance".parse::<Statement>().is_err());
        assert!("boat:read".parse::<Statement>().is_err());
        assert!("property:fly".parse::<Statement>().is_err());
    }

    #[test]
    fn only_read_and_contact_are_read_class() {
        let read_class: Vec<_> = Action::ALL.into_iter().filter(Action::is_read_class).collect();
        assert_eq!(read_class, vec![Read, Contact]);
    }

    #[test]
    fn statements_enumerates_the_table() {
        let registry = StatementRegistry::standard();
        let expected: usize = STATEMENT_TABLE.iter().map(|(_, acts)| acts.len()).sum();
        assert_eq!(registry.statements().count(), expected);
    }
}
