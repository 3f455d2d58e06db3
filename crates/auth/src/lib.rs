//! `rentgate-auth`: fail-closed authorization core for the rental platform.
//!
//! Decisions are pure functions of a subject, a statement and a resource
//! scope. Storage is reached only through the traits in [`store`], and no
//! transport concerns live here.

pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod guard;
pub mod membership;
pub mod roles;
pub mod scope;
pub mod session;
pub mod statements;
pub mod store;

pub use config::GateConfig;
pub use context::EvaluationContext;
pub use decision::{Decision, DecisionReason};
pub use error::{AuthorizationDenied, AuthzError, StoreError, PUBLIC_DENIAL_MESSAGE};
pub use evaluator::{DecisionExplanation, PermissionEvaluator, Subject};
pub use gate::AuthorizationGate;
pub use guard::{Guarded, Requirement};
pub use membership::{Membership, MembershipResolver, MembershipStatus};
pub use roles::{
    CatalogError, CatalogSnapshot, GrantSet, Grants, Role, RoleCatalog, RoleDefinition, RoleName,
    CATALOG_VERSION,
};
pub use scope::{ResourceScope, ResourceScopeIndex, ScopeError, ScopeRecord};
pub use session::{validate_claims, SessionClaims, TokenValidationError};
pub use statements::{Action, ResourceType, Statement, StatementRegistry};
pub use store::{MembershipStore, OrganizationStore, ResourceScopeStore};
