use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{ApiKeyGrant, Membership, Tenant};
use crate::filter::{FilterError, ListQuery};
use crate::types::{Role, TenantId};

/// A stored row as a JSON object, keyed by column name
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Stamp `deleted_at`; the row disappears from every read
    Soft,
    /// Remove the row
    Hard,
}

/// Static description of one tenant-scoped table
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub searchable: &'static [&'static str],
    /// Columns unique per tenant among live rows (compared case-insensitively)
    pub unique: &'static [&'static str],
    /// `(column, table)` pairs that must name a row of the same tenant
    pub references: &'static [(&'static str, &'static str)],
    pub delete_mode: DeleteMode,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid query: {0}")]
    Query(#[from] FilterError),

    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(
                    db_err.constraint().map(|c| format!("duplicate value violates {}", c))
                        .unwrap_or_else(|| "duplicate value".to_string()),
                );
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::Conflict("referenced record does not exist".to_string());
            }
        }
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

/// Tenant-scoped row storage. Every method takes the tenant explicitly and
/// implementations must never touch a row belonging to another tenant.
#[async_trait]
pub trait Store: Send + Sync {
    /// One page of rows plus the total matching count
    async fn select(
        &self,
        table: &TableSpec,
        tenant_id: &TenantId,
        query: &ListQuery,
    ) -> Result<(Vec<Row>, i64), StoreError>;

    async fn select_by_id(&self, table: &TableSpec, tenant_id: &TenantId, id: Uuid) -> Result<Option<Row>, StoreError>;

    /// Insert `row`, stamping `tenant_id` from the parameter
    async fn insert(&self, table: &TableSpec, tenant_id: &TenantId, row: Row) -> Result<Row, StoreError>;

    /// Apply `patch` to a live row; `None` when no such row exists for the tenant
    async fn update(
        &self,
        table: &TableSpec,
        tenant_id: &TenantId,
        id: Uuid,
        patch: Row,
    ) -> Result<Option<Row>, StoreError>;

    async fn delete(&self, table: &TableSpec, tenant_id: &TenantId, id: Uuid) -> Result<bool, StoreError>;

    /// Live rows for the tenant
    async fn count(&self, table: &TableSpec, tenant_id: &TenantId) -> Result<i64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Identity lookups used to resolve a caller into a principal
#[async_trait]
pub trait Directory: Send + Sync {
    async fn tenant(&self, tenant_id: &TenantId) -> Result<Option<Tenant>, StoreError>;

    /// The user's membership in `workspace`, or their oldest membership when unspecified
    async fn membership(&self, user_id: Uuid, workspace: Option<&TenantId>) -> Result<Option<Membership>, StoreError>;

    async fn api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyGrant>, StoreError>;
}

/// Convenience bound for backends that serve both roles
pub trait Backend: Store + Directory {}

impl<T: Store + Directory> Backend for T {}

/// Read a column as a UUID, tolerating its string form
pub fn row_uuid(row: &Row, column: &str) -> Option<Uuid> {
    row.get(column).and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

/// Decode an `api_keys` row into what it grants
pub fn grant_from_row(row: &Row) -> Result<ApiKeyGrant, StoreError> {
    let key_id = row_uuid(row, "id").ok_or_else(|| StoreError::MalformedRow("api key without id".to_string()))?;
    let tenant_id = row_uuid(row, "tenant_id")
        .map(TenantId)
        .ok_or_else(|| StoreError::MalformedRow("api key without tenant".to_string()))?;
    let role = row
        .get("role")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::MalformedRow("api key without role".to_string()))?
        .parse::<Role>()
        .map_err(StoreError::MalformedRow)?;
    let expires_at = match row.get("expires_at").and_then(Value::as_str) {
        Some(raw) => Some(
            raw.parse::<DateTime<Utc>>()
                .map_err(|e| StoreError::MalformedRow(format!("api key expiry: {}", e)))?,
        ),
        None => None,
    };

    Ok(ApiKeyGrant {
        key_id,
        tenant_id,
        owner_id: row_uuid(row, "owner_id"),
        role,
        expires_at,
    })
}
