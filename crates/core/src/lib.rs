//! `rentgate-core`: tenancy primitives shared by the authorization core.
//!
//! This crate contains **pure domain** types (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod tenancy;

pub use error::{DomainError, DomainResult};
pub use id::{OrganizationId, ResourceId, TeamId, UserId};
pub use tenancy::{GlobalRole, Organization, SubscriptionLimits, Team, User};
