use uuid::Uuid;

use super::error::FilterError;
use super::filter::validate_identifier;
use super::filter_order::FilterOrder;
use super::types::{FieldFilter, ListQuery, PageLimits};

const RESERVED: &[&str] = &["search", "sort", "page", "page_size", "mine"];

impl ListQuery {
    /// Parse raw query-string pairs. Reserved keys drive paging, sorting and
    /// search; every other key becomes an equality filter. `mine=true`
    /// restricts results to records owned by `caller`.
    pub fn from_params(
        params: &[(String, String)],
        limits: &PageLimits,
        caller: Uuid,
    ) -> Result<Self, FilterError> {
        let mut query = ListQuery {
            page_size: limits.default_page_size,
            ..ListQuery::default()
        };

        for (key, value) in params {
            match key.as_str() {
                "search" => {
                    let term = value.trim();
                    if term.chars().count() > limits.max_search_length {
                        return Err(FilterError::SearchTooLong(limits.max_search_length));
                    }
                    query.search = (!term.is_empty()).then(|| term.to_string());
                }
                "sort" => query.sort.extend(FilterOrder::parse(value)?),
                "page" => {
                    query.page = value
                        .parse::<u32>()
                        .ok()
                        .filter(|p| *p >= 1)
                        .ok_or_else(|| FilterError::InvalidPage(format!("'{}' is not a positive integer", value)))?;
                }
                "page_size" => {
                    let size = value
                        .parse::<u32>()
                        .ok()
                        .filter(|s| *s >= 1)
                        .ok_or_else(|| FilterError::InvalidPageSize(format!("'{}' is not a positive integer", value)))?;
                    if size > limits.max_page_size {
                        tracing::debug!("Page size {} exceeds max {}, capping to max", size, limits.max_page_size);
                    }
                    query.page_size = size.min(limits.max_page_size);
                }
                "mine" => {
                    query.owner = match value.as_str() {
                        "true" | "1" => Some(caller),
                        "false" | "0" | "" => None,
                        other => return Err(FilterError::InvalidMine(other.to_string())),
                    };
                }
                _ => {
                    validate_identifier(key).map_err(|_| FilterError::UnknownFilter(key.clone()))?;
                    query.filters.push(FieldFilter {
                        column: key.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        Ok(query)
    }

    /// Reject filters and sort keys outside the entity's whitelists
    pub fn check_columns(&self, filterable: &[&str], sortable: &[&str]) -> Result<(), FilterError> {
        if let Some(f) = self
            .filters
            .iter()
            .find(|f| RESERVED.contains(&f.column.as_str()) || !filterable.contains(&f.column.as_str()))
        {
            return Err(FilterError::UnknownFilter(f.column.clone()));
        }
        if let Some(s) = self
            .sort
            .iter()
            .find(|s| s.column != "id" && !sortable.contains(&s.column.as_str()))
        {
            return Err(FilterError::UnsortableColumn(s.column.clone()));
        }
        Ok(())
    }
}
