//! Postgres-backed directory.
//!
//! Implements the collaborator store traits over the schema in
//! `migrations/0001_authorization.sql`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError | Scenario |
//! |------------|------------|----------|
//! | PoolClosed / PoolTimedOut / Io / Tls | `Unavailable` | Database unreachable |
//! | ColumnDecode / Decode / ColumnNotFound | `Corrupt` | Row does not match the schema |
//! | Database | `Unavailable` | Query rejected by the server |
//! | Other | `Unavailable` | Anything else |
//!
//! Every failure is a store error; none is ever read as a decision.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;

use rentgate_auth::{
    Membership, MembershipStatus, MembershipStore, OrganizationStore, ResourceScopeStore,
    ResourceType, RoleName, ScopeRecord, StoreError,
};
use rentgate_core::{OrganizationId, ResourceId, TeamId, UserId};

/// Schema for the directory tables.
pub const SCHEMA: &str = include_str!("../../migrations/0001_authorization.sql");

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Postgres directory over a shared connection pool.
///
/// Queries always key on the full primary key, so a row for another
/// organization can never be returned for a membership lookup.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: Arc<PgPool>,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Connect using `DATABASE_URL`.
    pub async fn connect_from_env() -> Result<Self, StoreError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::unavailable("DATABASE_URL must be set to use the Postgres directory"))?;
        Self::connect(&database_url).await
    }

    /// Apply [`SCHEMA`]. Statements are idempotent.
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MembershipStore for PgDirectory {
    #[instrument(
        skip(self),
        fields(user_id = %user_id, organization_id = %organization_id),
        err
    )]
    async fn find_membership(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                user_id,
                organization_id,
                role,
                status,
                team_id
            FROM memberships
            WHERE user_id = $1 AND organization_id = $2
            "#,
        )
        .bind(*user_id.as_uuid())
        .bind(*organization_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_membership", e))?;

        row.map(|r| membership_from_row(&r)).transpose()
    }
}

#[async_trait]
impl ResourceScopeStore for PgDirectory {
    #[instrument(
        skip(self),
        fields(resource_type = %resource_type, resource_id = %resource_id),
        err
    )]
    async fn scope_of(
        &self,
        resource_type: ResourceType,
        resource_id: ResourceId,
    ) -> Result<Option<ScopeRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                organization_id,
                team_id,
                owner_id,
                caretaker_id,
                parent_property_id
            FROM resource_scopes
            WHERE resource_type = $1 AND resource_id = $2
            "#,
        )
        .bind(resource_type.as_str())
        .bind(*resource_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("scope_of", e))?;

        row.map(|r| scope_from_row(&r)).transpose()
    }
}

#[async_trait]
impl OrganizationStore for PgDirectory {
    #[instrument(skip(self), fields(organization_id = %organization_id), err)]
    async fn owner_id_of(&self, organization_id: OrganizationId) -> Result<Option<UserId>, StoreError> {
        let owner: Option<uuid::Uuid> = sqlx::query_scalar(
            r#"
            SELECT agent_owner_id
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(*organization_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("owner_id_of", e))?;

        Ok(owner.map(UserId::from_uuid))
    }
}

fn membership_from_row(row: &PgRow) -> Result<Membership, StoreError> {
    let decode = |e| map_sqlx_error("find_membership", e);

    let status: String = row.try_get("status").map_err(decode)?;
    let status = status
        .parse::<MembershipStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let role: String = row.try_get("role").map_err(decode)?;
    let team_id: Option<uuid::Uuid> = row.try_get("team_id").map_err(decode)?;

    Ok(Membership {
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(decode)?),
        organization_id: OrganizationId::from_uuid(row.try_get("organization_id").map_err(decode)?),
        role: RoleName::new(role),
        status,
        team_id: team_id.map(TeamId::from_uuid),
    })
}

fn scope_from_row(row: &PgRow) -> Result<ScopeRecord, StoreError> {
    let decode = |e| map_sqlx_error("scope_of", e);

    let team_id: Option<uuid::Uuid> = row.try_get("team_id").map_err(decode)?;
    let owner_id: Option<uuid::Uuid> = row.try_get("owner_id").map_err(decode)?;
    let caretaker_id: Option<uuid::Uuid> = row.try_get("caretaker_id").map_err(decode)?;
    let parent_property_id: Option<uuid::Uuid> = row.try_get("parent_property_id").map_err(decode)?;

    Ok(ScopeRecord {
        organization_id: OrganizationId::from_uuid(row.try_get("organization_id").map_err(decode)?),
        team_id: team_id.map(TeamId::from_uuid),
        owner_id: owner_id.map(UserId::from_uuid),
        caretaker_id: caretaker_id.map(UserId::from_uuid),
        parent_property_id: parent_property_id.map(ResourceId::from_uuid),
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::ColumnNotFound(column) => {
            StoreError::Corrupt(format!("column {column} missing in {operation}"))
        }
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Corrupt(format!("column {index} undecodable in {operation}: {source}"))
        }
        sqlx::Error::Decode(e) => StoreError::Corrupt(format!("decode error in {operation}: {e}")),
        sqlx::Error::Database(db_err) => {
            StoreError::Unavailable(format!("database error in {operation}: {}", db_err.message()))
        }
        other => StoreError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_are_unavailable() {
        assert!(matches!(
            map_sqlx_error("find_membership", sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(msg) if msg.contains("find_membership")
        ));
    }

    #[test]
    fn schema_errors_are_corrupt() {
        assert!(matches!(
            map_sqlx_error("scope_of", sqlx::Error::ColumnNotFound("team_id".into())),
            StoreError::Corrupt(msg) if msg.contains("team_id")
        ));
    }

    #[test]
    fn schema_defines_every_lookup_table() {
        for table in ["users", "organizations", "teams", "memberships", "resource_scopes"] {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn schema_status_values_match_lifecycle() {
        for status in [
            MembershipStatus::Invited,
            MembershipStatus::Active,
            MembershipStatus::Suspended,
            MembershipStatus::Removed,
        ] {
            assert!(SCHEMA.contains(&format!("'{}'", status.as_str())));
        }
    }
}
