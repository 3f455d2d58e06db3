//! Directory adapters backing the authorization collaborator stores.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryDirectory;
pub use postgres::PgDirectory;

use thiserror::Error;

use rentgate_auth::{MembershipStatus, StoreError};
use rentgate_core::DomainError;

/// Failure of a directory maintenance operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("subscription limit reached for {0}")]
    LimitReached(&'static str),

    #[error("illegal membership transition {from} -> {to}")]
    IllegalTransition {
        from: MembershipStatus,
        to: MembershipStatus,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DirectoryError {
    pub fn not_found(kind: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
