//! Authorization and store error types.

use thiserror::Error;

use rentgate_core::ResourceId;

use crate::decision::DecisionReason;
use crate::statements::{Action, ResourceType};

/// Message shown to end users for every denial, whatever the reason.
pub const PUBLIC_DENIAL_MESSAGE: &str = "forbidden";

/// Infrastructure failure in a collaborator store.
///
/// This is not an authorization decision: it must never be read as "allowed".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store lookup timed out after {millis}ms ({operation})")]
    Timeout { operation: &'static str, millis: u64 },

    #[error("corrupt store record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// A typed denial carrying the machine-readable reason.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("forbidden ({reason}) on {resource_type}:{action}")]
pub struct AuthorizationDenied {
    pub reason: DecisionReason,
    pub resource_type: ResourceType,
    pub action: Action,
    pub resource_id: Option<ResourceId>,
}

impl AuthorizationDenied {
    pub fn public_message(&self) -> &'static str {
        PUBLIC_DENIAL_MESSAGE
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error(transparent)]
    Denied(#[from] AuthorizationDenied),

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl AuthzError {
    /// The deny reason, if this is an authorization decision.
    pub fn reason(&self) -> Option<DecisionReason> {
        match self {
            AuthzError::Denied(denied) => Some(denied.reason),
            AuthzError::StoreUnavailable(_) => None,
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AuthzError::Denied(_))
    }

    /// Message safe to return to end users.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthzError::Denied(_) => PUBLIC_DENIAL_MESSAGE,
            AuthzError::StoreUnavailable(_) => "service temporarily unavailable",
        }
    }
}
