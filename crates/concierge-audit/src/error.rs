// error.rs - Error types for the audit subsystem.
//
// Every variant is a persistence failure. None of them is ever a policy
// denial, and callers must not treat them as one.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during audit operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to create the log's parent directory or open the log file.
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write an entry to the log.
    #[error("failed to append audit entry: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// Failed to serialize or deserialize an entry (malformed JSON).
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// An earlier append failed and its partial line could not be removed.
    /// The log is closed to further appends until it is repaired.
    #[error("audit log at {path} ends in a partial line; appends are refused")]
    Torn { path: PathBuf },

    /// The writer lock was poisoned by a panic in another appender.
    #[error("audit writer lock poisoned")]
    LockPoisoned,

    /// The hash chain is broken; the log has been tampered with.
    #[error("integrity check failed at line {line}: expected hash {expected}, got {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },
}
