use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Cannot sort by '{0}'")]
    UnsortableColumn(String),

    #[error("Invalid sort direction '{0}'")]
    InvalidSortDirection(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Invalid page size: {0}")]
    InvalidPageSize(String),

    #[error("Search term exceeds {0} characters")]
    SearchTooLong(usize),

    #[error("Invalid value for 'mine': {0}")]
    InvalidMine(String),
}

impl FilterError {
    /// Query-string field the error should be reported against
    pub fn field(&self) -> String {
        match self {
            FilterError::InvalidTableName(_) => "table".to_string(),
            FilterError::InvalidColumn(column) | FilterError::UnknownFilter(column) => column.clone(),
            FilterError::UnsortableColumn(_) | FilterError::InvalidSortDirection(_) => "sort".to_string(),
            FilterError::InvalidPage(_) => "page".to_string(),
            FilterError::InvalidPageSize(_) => "page_size".to_string(),
            FilterError::SearchTooLong(_) => "search".to_string(),
            FilterError::InvalidMine(_) => "mine".to_string(),
        }
    }
}
