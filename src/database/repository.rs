use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{Entity, NewRecord, Record};
use crate::database::store::{Row, Store, StoreError};
use crate::filter::{FilterError, ListQuery, Page, Pagination, SortKey};
use crate::types::TenantId;

/// Columns the repository owns; callers can never set them through a payload
const MANAGED_COLUMNS: &[&str] = &["id", "tenant_id", "owner_id", "created_at", "updated_at", "deleted_at"];

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("No fields to update")]
    EmptyPatch,

    #[error(transparent)]
    InvalidQuery(#[from] FilterError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Typed, tenant-scoped access to one entity's table. Every method takes the
/// tenant explicitly; there is no ambient tenant to fall back on.
pub struct Repository<E: Entity> {
    store: Arc<dyn Store>,
    _phantom: PhantomData<E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub async fn find_by_workspace(&self, tenant_id: &TenantId, query: &ListQuery) -> Result<Page<Record<E>>, RepositoryError> {
        query.check_columns(E::FILTERABLE, E::SORTABLE)?;

        let defaulted;
        let query = if query.sort.is_empty() {
            defaulted = ListQuery {
                sort: vec![SortKey::desc("created_at")],
                ..query.clone()
            };
            &defaulted
        } else {
            query
        };

        let (rows, total) = self.store.select(&E::TABLE, tenant_id, query).await?;
        let data = rows
            .into_iter()
            .map(|row| decode::<E>(tenant_id, row))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            data,
            pagination: Pagination::new(query.page, query.page_size, total),
        })
    }

    /// `None` both when the id does not exist and when it belongs to another tenant
    pub async fn find_by_id(&self, id: Uuid, tenant_id: &TenantId) -> Result<Option<Record<E>>, RepositoryError> {
        match self.store.select_by_id(&E::TABLE, tenant_id, id).await? {
            Some(row) => Ok(Some(decode::<E>(tenant_id, row)?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, new: NewRecord<E::Create>) -> Result<Record<E>, RepositoryError> {
        let mut row = to_row(&new.attrs)?;
        for column in MANAGED_COLUMNS {
            row.remove(*column);
        }

        let now = Value::String(Utc::now().to_rfc3339());
        row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        row.insert(
            "owner_id".to_string(),
            new.owner_id.map(|o| Value::String(o.to_string())).unwrap_or(Value::Null),
        );
        row.insert("created_at".to_string(), now.clone());
        row.insert("updated_at".to_string(), now);

        let stored = self.store.insert(&E::TABLE, &new.tenant_id, row).await?;
        let record = decode::<E>(&new.tenant_id, stored)?;
        tracing::debug!("Created {} {} in tenant {}", E::NAME, record.id, new.tenant_id);
        Ok(record)
    }

    /// Apply the supplied fields of `patch`. Absent fields are left untouched.
    pub async fn update(&self, id: Uuid, tenant_id: &TenantId, patch: &E::Patch) -> Result<Option<Record<E>>, RepositoryError> {
        let mut changes = to_row(patch)?;
        changes.retain(|column, value| !value.is_null() && !MANAGED_COLUMNS.contains(&column.as_str()));
        if changes.is_empty() {
            return Err(RepositoryError::EmptyPatch);
        }
        changes.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));

        match self.store.update(&E::TABLE, tenant_id, id, changes).await? {
            Some(row) => Ok(Some(decode::<E>(tenant_id, row)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: Uuid, tenant_id: &TenantId) -> Result<bool, RepositoryError> {
        let deleted = self.store.delete(&E::TABLE, tenant_id, id).await?;
        if deleted {
            tracing::debug!("Deleted {} {} in tenant {}", E::NAME, id, tenant_id);
        }
        Ok(deleted)
    }

    pub async fn count(&self, tenant_id: &TenantId) -> Result<i64, RepositoryError> {
        Ok(self.store.count(&E::TABLE, tenant_id).await?)
    }
}

fn to_row<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::MalformedRow(format!("expected an object, got {}", other))),
        Err(e) => Err(StoreError::MalformedRow(e.to_string())),
    }
}

fn decode<E: Entity>(tenant_id: &TenantId, row: Map<String, Value>) -> Result<Record<E>, RepositoryError> {
    let record: Record<E> = serde_json::from_value(Value::Object(row))
        .map_err(|e| StoreError::MalformedRow(format!("{}: {}", E::NAME, e)))?;

    if record.tenant_id != *tenant_id {
        tracing::error!(
            "Store returned {} {} of tenant {} for tenant {}",
            E::NAME,
            record.id,
            record.tenant_id,
            tenant_id
        );
        return Err(StoreError::MalformedRow("row belongs to another tenant".to_string()).into());
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::models::{Company, Lead, LeadPatch, LeadStatus, NewCompany, NewLead};

    fn new_lead(email: &str) -> NewLead {
        NewLead {
            first_name: "Ada".to_string(),
            last_name: Some("Lovelace".to_string()),
            email: email.to_string(),
            title: None,
            company_id: None,
            status: LeadStatus::New,
            source: Some("import".to_string()),
            score: Some(40),
        }
    }

    fn repos() -> (Repository<Lead>, Repository<Company>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        (Repository::new(store.clone()), Repository::new(store))
    }

    #[tokio::test]
    async fn create_assigns_identity_and_tenant() {
        let (leads, _) = repos();
        let tenant = TenantId::new();
        let owner = Uuid::new_v4();
        let lead = leads
            .create(NewRecord::new(tenant, Some(owner), new_lead("ada@example.com")))
            .await
            .unwrap();
        assert_eq!(lead.tenant_id, tenant);
        assert_eq!(lead.owner_id, Some(owner));
        assert_eq!(lead.attributes.status, LeadStatus::New);
        let found = leads.find_by_id(lead.id, &tenant).await.unwrap().unwrap();
        assert_eq!(found.attributes.email, "ada@example.com");
    }

    #[tokio::test]
    async fn other_tenant_sees_not_found() {
        let (leads, _) = repos();
        let (a, b) = (TenantId::new(), TenantId::new());
        let lead = leads.create(NewRecord::new(a, None, new_lead("a@x.io"))).await.unwrap();

        assert!(leads.find_by_id(lead.id, &b).await.unwrap().is_none());
        let patch = LeadPatch { score: Some(99), ..LeadPatch::default() };
        assert!(leads.update(lead.id, &b, &patch).await.unwrap().is_none());
        assert!(!leads.delete(lead.id, &b).await.unwrap());
        let unchanged = leads.find_by_id(lead.id, &a).await.unwrap().unwrap();
        assert_eq!(unchanged.attributes.score, Some(40));
    }

    #[tokio::test]
    async fn update_touches_only_supplied_fields() {
        let (leads, _) = repos();
        let tenant = TenantId::new();
        let lead = leads.create(NewRecord::new(tenant, None, new_lead("a@x.io"))).await.unwrap();

        let patch = LeadPatch { status: Some(LeadStatus::Qualified), ..LeadPatch::default() };
        let updated = leads.update(lead.id, &tenant, &patch).await.unwrap().unwrap();
        assert_eq!(updated.attributes.status, LeadStatus::Qualified);
        assert_eq!(updated.attributes.last_name.as_deref(), Some("Lovelace"));
        assert!(updated.updated_at >= lead.updated_at);

        assert!(matches!(
            leads.update(lead.id, &tenant, &LeadPatch::default()).await,
            Err(RepositoryError::EmptyPatch)
        ));
    }

    #[tokio::test]
    async fn deleted_records_disappear_from_reads_and_counts() {
        let (leads, _) = repos();
        let tenant = TenantId::new();
        let lead = leads.create(NewRecord::new(tenant, None, new_lead("a@x.io"))).await.unwrap();
        leads.create(NewRecord::new(tenant, None, new_lead("b@x.io"))).await.unwrap();

        assert!(leads.delete(lead.id, &tenant).await.unwrap());
        assert!(leads.find_by_id(lead.id, &tenant).await.unwrap().is_none());
        assert_eq!(leads.count(&tenant).await.unwrap(), 1);
        let page = leads.find_by_workspace(&tenant, &ListQuery::default()).await.unwrap();
        assert_eq!(page.pagination.total, 1);
    }

    #[tokio::test]
    async fn list_rejects_columns_outside_whitelist() {
        let (leads, _) = repos();
        let query = ListQuery::default().filter("tenant_id", TenantId::new().to_string());
        assert!(matches!(
            leads.find_by_workspace(&TenantId::new(), &query).await,
            Err(RepositoryError::InvalidQuery(FilterError::UnknownFilter(_)))
        ));
    }

    #[tokio::test]
    async fn list_defaults_to_newest_first() {
        let (leads, _) = repos();
        let tenant = TenantId::new();
        let first = leads.create(NewRecord::new(tenant, None, new_lead("a@x.io"))).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = leads.create(NewRecord::new(tenant, None, new_lead("b@x.io"))).await.unwrap();

        let page = leads.find_by_workspace(&tenant, &ListQuery::default()).await.unwrap();
        let ids: Vec<Uuid> = page.data.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn references_must_stay_inside_the_tenant() {
        let (leads, companies) = repos();
        let (a, b) = (TenantId::new(), TenantId::new());
        let company = companies
            .create(NewRecord::new(
                a,
                None,
                NewCompany {
                    name: "Acme".to_string(),
                    domain: Some("acme.io".to_string()),
                    industry: None,
                    employee_count: None,
                    website: None,
                },
            ))
            .await
            .unwrap();

        let mut cross = new_lead("x@x.io");
        cross.company_id = Some(company.id);
        assert!(matches!(
            leads.create(NewRecord::new(b, None, cross.clone())).await,
            Err(RepositoryError::Store(StoreError::Conflict(_)))
        ));
        assert!(leads.create(NewRecord::new(a, None, cross)).await.is_ok());
    }
}
