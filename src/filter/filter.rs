use uuid::Uuid;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{ListQuery, SqlResult};
use crate::types::TenantId;

/// SQL generator for one tenant-scoped read. There is no constructor
/// without a tenant, so every statement it emits carries the predicate.
pub struct Filter<'q> {
    table_name: String,
    tenant_id: Uuid,
    id: Option<Uuid>,
    query: Option<&'q ListQuery>,
    search_columns: &'q [&'q str],
}

impl<'q> Filter<'q> {
    pub fn new(table_name: impl Into<String>, tenant_id: &TenantId) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        validate_identifier(&table_name).map_err(|_| FilterError::InvalidTableName(table_name.clone()))?;
        Ok(Self {
            table_name,
            tenant_id: *tenant_id.as_uuid(),
            id: None,
            query: None,
            search_columns: &[],
        })
    }

    pub fn by_id(&mut self, id: Uuid) -> &mut Self {
        self.id = Some(id);
        self
    }

    pub fn assign(&mut self, query: &'q ListQuery, search_columns: &'q [&'q str]) -> &mut Self {
        self.query = Some(query);
        self.search_columns = search_columns;
        self
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_clause()?;
        let mut query = format!(
            "SELECT to_jsonb(t.*) AS row FROM \"{}\" AS t WHERE {}",
            self.table_name, where_clause
        );

        if let Some(list) = self.query {
            query.push(' ');
            query.push_str(&FilterOrder::generate(&list.sort)?);
            query.push_str(&format!(" LIMIT {} OFFSET {}", list.page_size, list.offset()));
        }

        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_clause()?;
        let query = format!(
            "SELECT COUNT(*) AS count FROM \"{}\" AS t WHERE {}",
            self.table_name, where_clause
        );
        Ok(SqlResult { query, params })
    }

    fn where_clause(&self) -> Result<(String, Vec<serde_json::Value>), FilterError> {
        let mut filter_where = FilterWhere::new(&self.tenant_id);
        if let Some(id) = &self.id {
            filter_where.id(id);
        }
        if let Some(list) = self.query {
            filter_where.equals(&list.filters)?;
            if let Some(owner) = &list.owner {
                filter_where.owner(owner);
            }
            if let Some(term) = &list.search {
                filter_where.search(term, self.search_columns)?;
            }
        }
        Ok(filter_where.build())
    }
}

/// Accept `[A-Za-z_][A-Za-z0-9_]*` only; identifiers are interpolated into SQL
pub fn validate_identifier(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(FilterError::InvalidColumn(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::SortKey;

    #[test]
    fn select_by_id_is_tenant_scoped() {
        let tenant = TenantId::new();
        let id = Uuid::new_v4();
        let mut filter = Filter::new("leads", &tenant).unwrap();
        filter.by_id(id);
        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT to_jsonb(t.*) AS row FROM \"leads\" AS t WHERE t.\"tenant_id\" = $1::uuid AND t.\"deleted_at\" IS NULL AND t.\"id\" = $2::uuid"
        );
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn list_query_renders_order_and_paging() {
        let tenant = TenantId::new();
        let query = ListQuery::default()
            .filter("status", "active")
            .search("acme")
            .sort_by(SortKey::desc("created_at"))
            .page(3, 20);
        let mut filter = Filter::new("campaigns", &tenant).unwrap();
        filter.assign(&query, &["name"]);
        let sql = filter.to_sql().unwrap();
        assert!(sql.query.contains("t.\"status\"::text = $2"));
        assert!(sql.query.contains("(t.\"name\"::text ILIKE $3)"));
        assert!(sql.query.ends_with("ORDER BY t.\"created_at\" DESC, t.\"id\" ASC LIMIT 20 OFFSET 40"));

        let count = filter.to_count_sql().unwrap();
        assert!(count.query.starts_with("SELECT COUNT(*) AS count FROM \"campaigns\" AS t WHERE t.\"tenant_id\" = $1::uuid"));
        assert!(!count.query.contains("LIMIT"));
    }

    #[test]
    fn validates_identifiers() {
        assert!(validate_identifier("created_at").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1col").is_err());
        assert!(validate_identifier("a-b").is_err());
        assert!(Filter::new("leads; DROP", &TenantId::new()).is_err());
    }
}
