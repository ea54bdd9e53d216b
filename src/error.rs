use std::io;

use thiserror::Error;

/// Failures raised by the reconciliation and view engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid import format: {0}")]
    InvalidFormat(String),
    #[error("schema mismatch: expected at least {expected} column(s), found {found}")]
    SchemaMismatch { expected: usize, found: usize },
    #[error("persistence failure during {operation}: {reason}")]
    Persistence { operation: String, reason: String },
    #[error("records were saved but document '{document}' was not: {reason}")]
    AuxiliaryPersistence { document: String, reason: String },
    #[error("import was cancelled before completion")]
    Cancelled,
    #[error("an import is already running; cancel it before committing another")]
    ImportInProgress,
    #[error("no record with key '{0}'")]
    UnknownRecord(String),
    #[error("field '{0}' is not user-editable")]
    NotSticky(String),
    #[error("unknown facet '{0}'")]
    UnknownFacet(String),
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("department '{0}' is not in the configured list")]
    UnknownDepartment(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat(message.into())
    }

    pub fn persistence(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Persistence {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// True for structural problems with the input file rather than the store.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidFormat(_) | Self::SchemaMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
