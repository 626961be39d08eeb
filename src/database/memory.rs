use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{ApiKeyGrant, Membership, Tenant};
use crate::database::store::{grant_from_row, row_uuid, DeleteMode, Directory, Row, Store, StoreError, TableSpec};
use crate::filter::{ListQuery, SortDirection, SortKey};
use crate::types::TenantId;

/// In-process backend with the same tenant semantics as `PgStore`.
/// Backs the test suite and database-less development runs.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    tenants: RwLock<HashMap<TenantId, Tenant>>,
    memberships: RwLock<Vec<Membership>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            tenants: RwLock::new(HashMap::new()),
            memberships: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    pub async fn add_tenant(&self, tenant: Tenant) {
        self.tenants.write().await.insert(tenant.id, tenant);
    }

    pub async fn add_membership(&self, membership: Membership) {
        let mut memberships = self.memberships.write().await;
        memberships.retain(|m| !(m.user_id == membership.user_id && m.tenant_id == membership.tenant_id));
        memberships.push(membership);
    }

    /// Simulate an outage: every call fails with `StoreError::Unavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store marked unavailable".to_string()))
        }
    }
}

fn is_live(row: &Row, tenant_id: &TenantId) -> bool {
    row_uuid(row, "tenant_id") == Some(tenant_id.0) && row.get("deleted_at").map_or(true, Value::is_null)
}

/// Text form of a column, matching Postgres `::text` for the types we store
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn matches_query(row: &Row, query: &ListQuery, searchable: &[&str]) -> bool {
    let filters_match = query.filters.iter().all(|f| {
        row.get(&f.column).and_then(as_text).as_deref() == Some(f.value.as_str())
    });
    if !filters_match {
        return false;
    }

    if let Some(owner) = query.owner {
        if row_uuid(row, "owner_id") != Some(owner) {
            return false;
        }
    }

    match &query.search {
        Some(term) if !searchable.is_empty() => {
            let needle = term.to_lowercase();
            searchable.iter().any(|column| {
                row.get(*column)
                    .and_then(as_text)
                    .map(|text| text.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
        }
        _ => true,
    }
}

/// Nulls sort as the largest value, as in Postgres
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            if let (Ok(x), Ok(y)) = (x.parse::<DateTime<Utc>>(), y.parse::<DateTime<Utc>>()) {
                return x.cmp(&y);
            }
            if let (Ok(x), Ok(y)) = (x.parse::<f64>(), y.parse::<f64>()) {
                return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            }
            x.cmp(y)
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn sort_rows(rows: &mut [Row], keys: &[SortKey]) {
    rows.sort_by(|a, b| {
        for key in keys {
            let ordering = compare_values(a.get(&key.column), b.get(&key.column));
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        compare_values(a.get("id"), b.get("id"))
    });
}

fn check_unique(
    rows: &[Row],
    table: &TableSpec,
    tenant_id: &TenantId,
    candidate: &Row,
    exclude: Option<Uuid>,
) -> Result<(), StoreError> {
    for column in table.unique {
        let Some(value) = candidate.get(*column).and_then(as_text).map(|v| v.to_lowercase()) else {
            continue;
        };
        let taken = rows.iter().any(|row| {
            is_live(row, tenant_id)
                && row_uuid(row, "id") != exclude
                && row.get(*column).and_then(as_text).map(|v| v.to_lowercase()).as_deref() == Some(value.as_str())
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "{} with this {} already exists",
                table.name, column
            )));
        }
    }
    Ok(())
}

fn check_references(
    tables: &HashMap<String, Vec<Row>>,
    table: &TableSpec,
    tenant_id: &TenantId,
    candidate: &Row,
) -> Result<(), StoreError> {
    for (column, target) in table.references {
        let Some(id) = candidate.get(*column).filter(|v| !v.is_null()) else {
            continue;
        };
        let id = id.as_str().and_then(|s| Uuid::parse_str(s).ok());
        // Soft-deleted targets count as missing
        let found = tables
            .get(*target)
            .map_or(false, |rows| rows.iter().any(|row| is_live(row, tenant_id) && row_uuid(row, "id") == id));
        if !found {
            return Err(StoreError::Conflict(format!("referenced {} does not exist", column)));
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(
        &self,
        table: &TableSpec,
        tenant_id: &TenantId,
        query: &ListQuery,
    ) -> Result<(Vec<Row>, i64), StoreError> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(table.name)
            .map(|rows| {
                rows.iter()
                    .filter(|row| is_live(row, tenant_id) && matches_query(row, query, table.searchable))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let total = rows.len() as i64;
        sort_rows(&mut rows, &query.sort);
        let page = rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size as usize)
            .collect();
        Ok((page, total))
    }

    async fn select_by_id(&self, table: &TableSpec, tenant_id: &TenantId, id: Uuid) -> Result<Option<Row>, StoreError> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        Ok(tables.get(table.name).and_then(|rows| {
            rows.iter()
                .find(|row| is_live(row, tenant_id) && row_uuid(row, "id") == Some(id))
                .cloned()
        }))
    }

    async fn insert(&self, table: &TableSpec, tenant_id: &TenantId, mut row: Row) -> Result<Row, StoreError> {
        self.ensure_available()?;
        row.insert("tenant_id".to_string(), Value::String(tenant_id.to_string()));
        row.entry("deleted_at".to_string()).or_insert(Value::Null);

        let mut tables = self.tables.write().await;
        check_references(&tables, table, tenant_id, &row)?;
        let rows = tables.entry(table.name.to_string()).or_default();
        check_unique(rows, table, tenant_id, &row, None)?;
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &TableSpec,
        tenant_id: &TenantId,
        id: Uuid,
        mut patch: Row,
    ) -> Result<Option<Row>, StoreError> {
        self.ensure_available()?;
        for column in ["id", "tenant_id", "created_at"] {
            patch.remove(column);
        }

        let mut tables = self.tables.write().await;
        let Some(index) = tables.get(table.name).and_then(|rows| {
            rows.iter()
                .position(|row| is_live(row, tenant_id) && row_uuid(row, "id") == Some(id))
        }) else {
            return Ok(None);
        };

        // Only references being changed are checked, as in Postgres
        check_references(&tables, table, tenant_id, &patch)?;
        let mut updated = tables[table.name][index].clone();
        updated.extend(patch);

        let rows = tables.entry(table.name.to_string()).or_default();
        check_unique(rows, table, tenant_id, &updated, Some(id))?;
        rows[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, table: &TableSpec, tenant_id: &TenantId, id: Uuid) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table.name) else {
            return Ok(false);
        };
        let Some(index) = rows
            .iter()
            .position(|row| is_live(row, tenant_id) && row_uuid(row, "id") == Some(id))
        else {
            return Ok(false);
        };

        match table.delete_mode {
            DeleteMode::Soft => {
                let now = Value::String(Utc::now().to_rfc3339());
                rows[index].insert("deleted_at".to_string(), now.clone());
                rows[index].insert("updated_at".to_string(), now);
            }
            DeleteMode::Hard => {
                rows.remove(index);
            }
        }
        Ok(true)
    }

    async fn count(&self, table: &TableSpec, tenant_id: &TenantId) -> Result<i64, StoreError> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(table.name)
            .map(|rows| rows.iter().filter(|row| is_live(row, tenant_id)).count() as i64)
            .unwrap_or(0))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.ensure_available()
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn tenant(&self, tenant_id: &TenantId) -> Result<Option<Tenant>, StoreError> {
        self.ensure_available()?;
        Ok(self.tenants.read().await.get(tenant_id).cloned())
    }

    async fn membership(&self, user_id: Uuid, workspace: Option<&TenantId>) -> Result<Option<Membership>, StoreError> {
        self.ensure_available()?;
        let memberships = self.memberships.read().await;
        let mut candidates = memberships
            .iter()
            .filter(|m| m.user_id == user_id && workspace.map_or(true, |ws| m.tenant_id == *ws));
        Ok(match workspace {
            Some(_) => candidates.next().cloned(),
            None => candidates.min_by_key(|m| m.created_at).cloned(),
        })
    }

    async fn api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyGrant>, StoreError> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        let Some(row) = tables.get("api_keys").and_then(|rows| {
            rows.iter().find(|row| {
                row.get("deleted_at").map_or(true, Value::is_null)
                    && row.get("key_hash").and_then(Value::as_str) == Some(key_hash)
            })
        }) else {
            return Ok(None);
        };
        grant_from_row(row).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use serde_json::json;

    const PEOPLE: TableSpec = TableSpec {
        name: "people",
        searchable: &["name"],
        unique: &["email"],
        references: &[],
        delete_mode: DeleteMode::Soft,
    };

    fn row(value: serde_json::Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn person(name: &str, email: &str, score: i64) -> Row {
        row(json!({
            "id": Uuid::new_v4().to_string(),
            "name": name,
            "email": email,
            "score": score,
            "created_at": Utc::now().to_rfc3339(),
        }))
    }

    #[tokio::test]
    async fn rows_are_invisible_to_other_tenants() {
        let store = MemoryStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        let inserted = store.insert(&PEOPLE, &a, person("Ada", "ada@x.io", 1)).await.unwrap();
        let id = row_uuid(&inserted, "id").unwrap();

        assert!(store.select_by_id(&PEOPLE, &b, id).await.unwrap().is_none());
        assert!(store.update(&PEOPLE, &b, id, row(json!({"name": "Eve"}))).await.unwrap().is_none());
        assert!(!store.delete(&PEOPLE, &b, id).await.unwrap());
        assert_eq!(store.count(&PEOPLE, &b).await.unwrap(), 0);
        assert_eq!(store.count(&PEOPLE, &a).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn insert_stamps_tenant_from_parameter() {
        let store = MemoryStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        let mut forged = person("Ada", "ada@x.io", 1);
        forged.insert("tenant_id".into(), json!(b.to_string()));
        let inserted = store.insert(&PEOPLE, &a, forged).await.unwrap();
        assert_eq!(row_uuid(&inserted, "tenant_id"), Some(a.0));
    }

    #[tokio::test]
    async fn uniqueness_is_per_tenant_and_ignores_deleted_rows() {
        let store = MemoryStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        let first = store.insert(&PEOPLE, &a, person("Ada", "ada@x.io", 1)).await.unwrap();
        assert!(matches!(
            store.insert(&PEOPLE, &a, person("Ada", "ADA@x.io", 2)).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(store.insert(&PEOPLE, &b, person("Ada", "ada@x.io", 1)).await.is_ok());

        store.delete(&PEOPLE, &a, row_uuid(&first, "id").unwrap()).await.unwrap();
        assert!(store.insert(&PEOPLE, &a, person("Ada", "ada@x.io", 3)).await.is_ok());
    }

    #[tokio::test]
    async fn select_filters_searches_sorts_and_pages() {
        let store = MemoryStore::new();
        let tenant = TenantId::new();
        for (name, score) in [("Alpha", 3), ("Beta", 1), ("Alphonse", 2), ("Gamma", 5)] {
            store
                .insert(&PEOPLE, &tenant, person(name, &format!("{}@x.io", name), score))
                .await
                .unwrap();
        }

        let query = ListQuery::default().search("alph").sort_by(SortKey::desc("score"));
        let (rows, total) = store.select(&PEOPLE, &tenant, &query).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0]["name"], "Alpha");
        assert_eq!(rows[1]["name"], "Alphonse");

        let query = ListQuery::default().sort_by(SortKey::asc("score")).page(2, 3);
        let (rows, total) = store.select(&PEOPLE, &tenant, &query).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Gamma");

        let query = ListQuery::default().filter("score", "1");
        let (rows, _) = store.select(&PEOPLE, &tenant, &query).await.unwrap();
        assert_eq!(rows[0]["name"], "Beta");
    }

    #[tokio::test]
    async fn membership_defaults_to_oldest() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let (first, second) = (TenantId::new(), TenantId::new());
        let mut older = Membership::new(user, first, Role::Admin);
        older.created_at = Utc::now() - chrono::Duration::days(3);
        store.add_membership(Membership::new(user, second, Role::Member)).await;
        store.add_membership(older).await;

        let picked = store.membership(user, None).await.unwrap().unwrap();
        assert_eq!(picked.tenant_id, first);
        let pinned = store.membership(user, Some(&second)).await.unwrap().unwrap();
        assert_eq!(pinned.role, Role::Member);
        assert!(store.membership(user, Some(&TenantId::new())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(store.health_check().await, Err(StoreError::Unavailable(_))));
        assert!(store.count(&PEOPLE, &TenantId::new()).await.is_err());
    }
}
