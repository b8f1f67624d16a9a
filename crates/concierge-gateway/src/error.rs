// error.rs - Error types for the concierge pipeline.
//
// A policy denial is not an error: it is an `Outcome::Denied`. Everything in
// here is an operational failure that the caller must surface as such.

use std::path::PathBuf;

use concierge_directory::EmployeeId;
use thiserror::Error;

/// Errors that can occur while running the decision, fetch, audit pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The audit write failed. Rows of an allowed request are withheld.
    #[error("audit write failed, data withheld: {0}")]
    AuditFailed(#[from] concierge_audit::AuditError),

    /// A capability token was presented to a pipeline that did not issue it.
    #[error("access grant was issued by a different concierge instance")]
    ForeignGrant,

    /// The requested filters reach past the employee the grant was decided
    /// for. Nothing is fetched.
    #[error("filter employee_id={requested} is outside the grant for employee {granted}")]
    OutOfScope {
        granted: EmployeeId,
        requested: serde_json::Value,
    },

    /// The employee table could not be loaded.
    #[error("employee directory error: {0}")]
    Directory(#[from] concierge_directory::DirectoryError),

    /// The configuration file could not be read.
    #[error("failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for `ConciergeConfig`.
    #[error("invalid config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
