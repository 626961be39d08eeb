use super::error::FilterError;
use super::filter::validate_identifier;
use super::types::{SortDirection, SortKey};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse `"-created_at,name"` or `"created_at desc, name asc"` into sort keys
    pub fn parse(raw: &str) -> Result<Vec<SortKey>, FilterError> {
        let mut out = Vec::new();
        for part in raw.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }

            let mut it = trimmed.split_whitespace();
            let Some(first) = it.next() else { continue };
            let (column, mut direction) = match first.strip_prefix('-') {
                Some(col) => (col, SortDirection::Desc),
                None => (first.strip_prefix('+').unwrap_or(first), SortDirection::Asc),
            };

            if let Some(dir) = it.next() {
                direction = match dir.to_ascii_lowercase().as_str() {
                    "asc" => SortDirection::Asc,
                    "desc" => SortDirection::Desc,
                    _ => return Err(FilterError::InvalidSortDirection(dir.to_string())),
                };
            }
            if let Some(extra) = it.next() {
                return Err(FilterError::InvalidSortDirection(extra.to_string()));
            }

            validate_identifier(column).map_err(|_| FilterError::UnsortableColumn(column.to_string()))?;
            out.push(SortKey { column: column.to_string(), direction });
        }
        Ok(out)
    }

    /// Render ORDER BY, always ending with `id` so paging is stable
    pub fn generate(keys: &[SortKey]) -> Result<String, FilterError> {
        let mut parts = Vec::with_capacity(keys.len() + 1);
        for key in keys {
            validate_identifier(&key.column)?;
            parts.push(format!("t.\"{}\" {}", key.column, key.direction.to_sql()));
        }
        if !keys.iter().any(|k| k.column == "id") {
            parts.push("t.\"id\" ASC".to_string());
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}
