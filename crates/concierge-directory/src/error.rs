// error.rs - Error types for loading the employee directory.

use std::path::PathBuf;
use thiserror::Error;

use crate::employee::EmployeeId;

/// Errors that can occur while building an [`EmployeeDirectory`](crate::EmployeeDirectory).
///
/// Lookups never fail with an error; a missing employee is just `None`.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The tabular source could not be opened.
    #[error("failed to open employee table at {path}: {source}")]
    OpenFailed { path: PathBuf, source: csv::Error },

    /// A row could not be parsed into an employee record.
    #[error("malformed employee row {row}: {source}")]
    MalformedRow { row: usize, source: csv::Error },

    /// Two rows share the same employee_id.
    #[error("duplicate employee_id {0}")]
    DuplicateId(EmployeeId),

    /// Two rows share the same email address.
    #[error("duplicate email '{0}'")]
    DuplicateEmail(String),
}
