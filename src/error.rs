use thiserror::Error;

use crate::database::DbError;

/// Errors surfaced by the monitoring core to the dialogue collaborator.
///
/// Mutation errors come back synchronously from the [`Monitor`] entry
/// points; wording for the end user is the caller's concern.
///
/// [`Monitor`]: crate::monitor::Monitor
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("a table named '{0}' already exists")]
    DuplicateName(String),

    #[error("a table for reference '{0}' already exists")]
    DuplicateReference(String),

    #[error("no table matches '{0}'")]
    TableNotFound(String),

    #[error("an identical watch is already registered")]
    DuplicateWatch,

    #[error("no watch matches the given region")]
    WatchNotFound,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Storage(#[from] DbError),
}

/// Failures reported by a sheet data source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("source '{0}' not found")]
    NotFound(String),

    #[error("source '{reference}' unreachable: {detail}")]
    Unreachable { reference: String, detail: String },

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("fetch timed out")]
    Timeout,
}

impl SourceError {
    pub fn unreachable(reference: impl Into<String>, detail: impl ToString) -> Self {
        SourceError::Unreachable {
            reference: reference.into(),
            detail: detail.to_string(),
        }
    }
}
