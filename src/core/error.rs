use thiserror::Error;

/// Configuration-class failures surfaced to the caller.
///
/// Data-quality problems (unparseable numbers, out-of-vocabulary multiselect
/// tokens, unrecognized instance elements) are never represented here; they
/// are logged and degraded in place so an otherwise well-formed submission is
/// never lost.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Schema '{0}' not found")]
    SchemaNotFound(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("No table registered for element '{0}'")]
    ElementNotFound(String),

    #[error("Form '{0}' produced no storable fields")]
    EmptyForm(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
