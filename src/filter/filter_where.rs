use serde_json::Value;
use uuid::Uuid;

use super::error::FilterError;
use super::filter::validate_identifier;
use super::types::FieldFilter;

/// Builds a parameterized WHERE clause. The tenant predicate is always `$1`
/// and is emitted before anything the caller supplied.
pub struct FilterWhere {
    param_values: Vec<Value>,
    conditions: Vec<String>,
}

impl FilterWhere {
    pub fn new(tenant_id: &Uuid) -> Self {
        let mut filter_where = Self {
            param_values: vec![],
            conditions: vec![],
        };
        let tenant = filter_where.param(Value::String(tenant_id.to_string()));
        filter_where.conditions.push(format!("t.\"tenant_id\" = {}::uuid", tenant));
        filter_where.conditions.push("t.\"deleted_at\" IS NULL".to_string());
        filter_where
    }

    pub fn id(&mut self, id: &Uuid) -> &mut Self {
        let p = self.param(Value::String(id.to_string()));
        self.conditions.push(format!("t.\"id\" = {}::uuid", p));
        self
    }

    pub fn owner(&mut self, owner_id: &Uuid) -> &mut Self {
        let p = self.param(Value::String(owner_id.to_string()));
        self.conditions.push(format!("t.\"owner_id\" = {}::uuid", p));
        self
    }

    pub fn equals(&mut self, filters: &[FieldFilter]) -> Result<&mut Self, FilterError> {
        for filter in filters {
            validate_identifier(&filter.column)?;
            let p = self.param(Value::String(filter.value.clone()));
            self.conditions.push(format!("t.\"{}\"::text = {}", filter.column, p));
        }
        Ok(self)
    }

    /// Case-insensitive substring match, OR-ed across `columns`
    pub fn search(&mut self, term: &str, columns: &[&str]) -> Result<&mut Self, FilterError> {
        if columns.is_empty() {
            return Ok(self);
        }
        for column in columns {
            validate_identifier(column)?;
        }

        let p = self.param(Value::String(format!("%{}%", escape_like(term))));
        let ors: Vec<String> = columns
            .iter()
            .map(|c| format!("t.\"{}\"::text ILIKE {}", c, p))
            .collect();
        self.conditions.push(format!("({})", ors.join(" OR ")));
        Ok(self)
    }

    pub fn build(self) -> (String, Vec<Value>) {
        (self.conditions.join(" AND "), self.param_values)
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.param_values.len())
    }
}

/// Escape LIKE metacharacters so user input matches literally
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_predicate_comes_first() {
        let tenant = Uuid::new_v4();
        let mut w = FilterWhere::new(&tenant);
        w.equals(&[FieldFilter { column: "status".into(), value: "new".into() }]).unwrap();
        let (sql, params) = w.build();
        assert_eq!(
            sql,
            "t.\"tenant_id\" = $1::uuid AND t.\"deleted_at\" IS NULL AND t.\"status\"::text = $2"
        );
        assert_eq!(params[0], Value::String(tenant.to_string()));
        assert_eq!(params[1], Value::String("new".into()));
    }

    #[test]
    fn search_shares_one_parameter() {
        let mut w = FilterWhere::new(&Uuid::new_v4());
        w.search("50%_off", &["name", "subject"]).unwrap();
        let (sql, params) = w.build();
        assert!(sql.ends_with("(t.\"name\"::text ILIKE $2 OR t.\"subject\"::text ILIKE $2)"));
        assert_eq!(params[1], Value::String("%50\\%\\_off%".into()));
    }

    #[test]
    fn rejects_unsafe_columns() {
        let mut w = FilterWhere::new(&Uuid::new_v4());
        let bad = FieldFilter { column: "name\" OR 1=1 --".into(), value: "x".into() };
        assert!(w.equals(&[bad]).is_err());
    }
}
