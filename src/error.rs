use thiserror::Error;

/// Fatal problems with the shape of an input table.
///
/// Anything recoverable (bad dates, malformed emails, inconsistent totals) is
/// handled inside the cleaners and never surfaces here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{dataset}: expected column '{column}' is missing")]
    MissingColumn { dataset: String, column: String },
}

impl SchemaError {
    pub fn missing_column(dataset: &str, column: &str) -> Self {
        SchemaError::MissingColumn {
            dataset: dataset.to_string(),
            column: column.to_string(),
        }
    }
}
