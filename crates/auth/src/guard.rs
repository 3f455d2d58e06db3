use rentgate_core::ResourceId;

use crate::statements::{Action, ResourceType, Statement};

/// One statement a command needs, optionally against a specific resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub statement: Statement,
    pub resource_id: Option<ResourceId>,
}

impl Requirement {
    /// Organization-level requirement (creation, listing).
    pub fn on_organization(resource_type: ResourceType, action: Action) -> Self {
        Self {
            statement: Statement::new(resource_type, action),
            resource_id: None,
        }
    }

    pub fn on_resource(resource_type: ResourceType, action: Action, resource_id: ResourceId) -> Self {
        Self {
            statement: Statement::new(resource_type, action),
            resource_id: Some(resource_id),
        }
    }
}

/// Command-side authorization contract (checked at the command boundary).
///
/// Implement this on commands that require permissions. Transport layers
/// call [`AuthorizationGate::assert_command`](crate::AuthorizationGate::assert_command)
/// before dispatching.
pub trait Guarded {
    fn requirements(&self) -> Vec<Requirement>;
}
