use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row as _};
use uuid::Uuid;

use crate::database::models::{ApiKeyGrant, Membership, Tenant};
use crate::database::schema;
use crate::database::store::{grant_from_row, DeleteMode, Directory, Row, Store, StoreError, TableSpec};
use crate::filter::{validate_identifier, Filter, FilterError, ListQuery, SqlResult};
use crate::types::{Role, TenantId};

/// Postgres backend. Business rows travel as JSON objects through
/// `to_jsonb` / `jsonb_populate_record`, so one code path serves every table.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn apply_schema(&self) -> Result<usize, StoreError> {
        let statements = schema::statements();
        for statement in &statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Applied {} schema statements", statements.len());
        Ok(statements.len())
    }

    pub async fn create_tenant(&self, tenant: &Tenant) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tenants (id, name, slug, plan, is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(tenant.id.0)
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(&tenant.plan)
        .bind(tenant.is_active)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO memberships (user_id, tenant_id, role, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, tenant_id) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(membership.user_id)
        .bind(membership.tenant_id.0)
        .bind(membership.role.as_str())
        .bind(membership.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_rows(&self, sql: &SqlResult) -> Result<Vec<Row>, StoreError> {
        let rows = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(json_row).collect()
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Value::String(s) => query.bind(s.as_str()),
            Value::Null => query.bind(Option::<String>::None),
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn json_row(row: &PgRow) -> Result<Row, StoreError> {
    match row.try_get::<Value, _>("row")? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::MalformedRow(format!("expected an object, got {}", other))),
    }
}

/// `"a" = r."a", "b" = r."b"` for the patch columns, skipping immutable ones
fn assignments(patch: &Row) -> Result<String, FilterError> {
    let mut parts = Vec::new();
    for column in patch.keys() {
        if matches!(column.as_str(), "id" | "tenant_id" | "created_at") {
            continue;
        }
        validate_identifier(column)?;
        parts.push(format!("\"{}\" = r.\"{}\"", column, column));
    }
    Ok(parts.join(", "))
}

fn checked_table(table: &TableSpec) -> Result<&'static str, StoreError> {
    validate_identifier(table.name).map_err(|_| FilterError::InvalidTableName(table.name.to_string()))?;
    Ok(table.name)
}

impl PgStore {
    /// Foreign keys also match soft-deleted rows; referenced rows must be live
    async fn check_references(&self, table: &TableSpec, tenant_id: &TenantId, row: &Row) -> Result<(), StoreError> {
        for (column, target) in table.references {
            let Some(value) = row.get(*column).filter(|v| !v.is_null()) else {
                continue;
            };
            validate_identifier(target)?;
            let id = value.as_str().and_then(|s| Uuid::parse_str(s).ok());
            let Some(id) = id else {
                return Err(StoreError::Conflict(format!("referenced {} does not exist", column)));
            };

            let sql = format!(
                "SELECT EXISTS (SELECT 1 FROM \"{target}\" \
                 WHERE \"tenant_id\" = $1::uuid AND \"id\" = $2::uuid AND \"deleted_at\" IS NULL) AS live"
            );
            let live: bool = sqlx::query(&sql)
                .bind(tenant_id.0)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
                .try_get("live")?;
            if !live {
                return Err(StoreError::Conflict(format!("referenced {} does not exist", column)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn select(
        &self,
        table: &TableSpec,
        tenant_id: &TenantId,
        query: &ListQuery,
    ) -> Result<(Vec<Row>, i64), StoreError> {
        let mut filter = Filter::new(table.name, tenant_id)?;
        filter.assign(query, table.searchable);

        let rows = self.fetch_rows(&filter.to_sql()?).await?;

        let count_sql = filter.to_count_sql()?;
        let total: i64 = bind_params(sqlx::query(&count_sql.query), &count_sql.params)
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;

        Ok((rows, total))
    }

    async fn select_by_id(&self, table: &TableSpec, tenant_id: &TenantId, id: Uuid) -> Result<Option<Row>, StoreError> {
        let mut filter = Filter::new(table.name, tenant_id)?;
        filter.by_id(id);
        Ok(self.fetch_rows(&filter.to_sql()?).await?.into_iter().next())
    }

    async fn insert(&self, table: &TableSpec, tenant_id: &TenantId, mut row: Row) -> Result<Row, StoreError> {
        let name = checked_table(table)?;
        row.insert("tenant_id".to_string(), Value::String(tenant_id.to_string()));
        self.check_references(table, tenant_id, &row).await?;

        let sql = format!(
            "INSERT INTO \"{name}\" AS t SELECT * FROM jsonb_populate_record(NULL::\"{name}\", $1::jsonb) \
             RETURNING to_jsonb(t.*) AS row"
        );
        let stored = sqlx::query(&sql)
            .bind(Json(Value::Object(row)))
            .fetch_one(&self.pool)
            .await?;
        json_row(&stored)
    }

    async fn update(
        &self,
        table: &TableSpec,
        tenant_id: &TenantId,
        id: Uuid,
        patch: Row,
    ) -> Result<Option<Row>, StoreError> {
        let name = checked_table(table)?;
        let assignments = assignments(&patch)?;
        if assignments.is_empty() {
            return self.select_by_id(table, tenant_id, id).await;
        }
        self.check_references(table, tenant_id, &patch).await?;

        let sql = format!(
            "UPDATE \"{name}\" AS t SET {assignments} \
             FROM jsonb_populate_record(NULL::\"{name}\", $3::jsonb) AS r \
             WHERE t.\"tenant_id\" = $1::uuid AND t.\"id\" = $2::uuid AND t.\"deleted_at\" IS NULL \
             RETURNING to_jsonb(t.*) AS row"
        );
        let updated = sqlx::query(&sql)
            .bind(tenant_id.0)
            .bind(id)
            .bind(Json(Value::Object(patch)))
            .fetch_optional(&self.pool)
            .await?;
        updated.as_ref().map(json_row).transpose()
    }

    async fn delete(&self, table: &TableSpec, tenant_id: &TenantId, id: Uuid) -> Result<bool, StoreError> {
        let name = checked_table(table)?;
        let sql = match table.delete_mode {
            DeleteMode::Soft => format!(
                "UPDATE \"{name}\" AS t SET \"deleted_at\" = now(), \"updated_at\" = now() \
                 WHERE t.\"tenant_id\" = $1::uuid AND t.\"id\" = $2::uuid AND t.\"deleted_at\" IS NULL"
            ),
            DeleteMode::Hard => format!(
                "DELETE FROM \"{name}\" AS t \
                 WHERE t.\"tenant_id\" = $1::uuid AND t.\"id\" = $2::uuid AND t.\"deleted_at\" IS NULL"
            ),
        };
        let result = sqlx::query(&sql).bind(tenant_id.0).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, table: &TableSpec, tenant_id: &TenantId) -> Result<i64, StoreError> {
        let sql = Filter::new(table.name, tenant_id)?.to_count_sql()?;
        let count: i64 = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;
        Ok(count)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn membership_from_row(row: &PgRow) -> Result<Membership, StoreError> {
    let role: String = row.try_get("role")?;
    Ok(Membership {
        user_id: row.try_get("user_id")?,
        tenant_id: TenantId(row.try_get("tenant_id")?),
        role: role.parse::<Role>().map_err(StoreError::MalformedRow)?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Directory for PgStore {
    async fn tenant(&self, tenant_id: &TenantId) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query("SELECT id, name, slug, plan, is_active, created_at FROM tenants WHERE id = $1")
            .bind(tenant_id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Tenant {
            id: TenantId(row.try_get("id")?),
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            plan: row.try_get("plan")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        }))
    }

    async fn membership(&self, user_id: Uuid, workspace: Option<&TenantId>) -> Result<Option<Membership>, StoreError> {
        let row = match workspace {
            Some(tenant_id) => {
                sqlx::query(
                    "SELECT user_id, tenant_id, role, created_at FROM memberships WHERE user_id = $1 AND tenant_id = $2",
                )
                .bind(user_id)
                .bind(tenant_id.0)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT user_id, tenant_id, role, created_at FROM memberships WHERE user_id = $1 \
                     ORDER BY created_at ASC LIMIT 1",
                )
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        row.as_ref().map(membership_from_row).transpose()
    }

    async fn api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyGrant>, StoreError> {
        let row = sqlx::query(
            "SELECT to_jsonb(k.*) AS row FROM api_keys AS k WHERE k.\"key_hash\" = $1 AND k.\"deleted_at\" IS NULL",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(grant_from_row(&json_row(&row)?)?)),
            None => Ok(None),
        }
    }
}
