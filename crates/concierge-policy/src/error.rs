// error.rs - Lookup failures inside rule evaluation.
//
// These never leave the crate as errors: `PolicyEngine::evaluate` turns every
// one of them into a deny decision with a generic reason.

use thiserror::Error;

/// Errors raised by individual rule checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The requesting email is not in the employee directory, so self and
    /// direct-report checks have nothing to compare against.
    #[error("requester '{email}' is not in the employee directory")]
    RequesterNotFound { email: String },
}
