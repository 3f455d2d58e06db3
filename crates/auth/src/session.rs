use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rentgate_core::{GlobalRole, OrganizationId, TeamId, UserId};

/// Session claims model (transport-agnostic).
///
/// This is the minimal set of claims expected once a session token has been
/// decoded/verified by whatever transport/security layer is in use. The
/// active organization and team are whatever the user last switched to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Organization the user is currently acting in.
    pub active_organization_id: OrganizationId,

    /// Team the user is currently acting in, if they picked one.
    #[serde(default)]
    pub active_team_id: Option<TeamId>,

    /// Platform-wide role tag of the user.
    #[serde(default)]
    pub global_role: GlobalRole,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate session claims.
///
/// Note: this validates the *claims* only. Signature verification / decoding is
/// intentionally outside this crate.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(issued_at: DateTime<Utc>, ttl: Duration) -> SessionClaims {
        SessionClaims {
            sub: UserId::new(),
            active_organization_id: OrganizationId::new(),
            active_team_id: None,
            global_role: GlobalRole::User,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    #[test]
    fn valid_inside_window() {
        let now = Utc::now();
        let c = claims(now - Duration::minutes(1), Duration::minutes(10));
        assert_eq!(validate_claims(&c, now), Ok(()));
    }

    #[test]
    fn rejects_expired_future_and_inverted_windows() {
        let now = Utc::now();
        let expired = claims(now - Duration::minutes(20), Duration::minutes(10));
        assert_eq!(validate_claims(&expired, now), Err(TokenValidationError::Expired));

        let future = claims(now + Duration::minutes(5), Duration::minutes(10));
        assert_eq!(validate_claims(&future, now), Err(TokenValidationError::NotYetValid));

        let inverted = claims(now, Duration::minutes(-1));
        assert_eq!(
            validate_claims(&inverted, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn global_role_defaults_when_absent() {
        let now = Utc::now();
        let c = claims(now, Duration::minutes(10));
        let mut json = serde_json::to_value(&c).unwrap();
        json.as_object_mut().unwrap().remove("global_role");
        json.as_object_mut().unwrap().remove("active_team_id");

        let parsed: SessionClaims = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.global_role, GlobalRole::User);
        assert_eq!(parsed.active_team_id, None);
    }
}
