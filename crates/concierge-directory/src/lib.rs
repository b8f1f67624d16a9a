//! # concierge-directory
//!
//! The employee snapshot every authorization decision is made against.
//!
//! An [`EmployeeDirectory`] is loaded once at process start (usually from
//! `data/employees.csv`), wrapped in an `Arc`, and handed to the policy
//! engine and the data projector. It has no mutating methods: reloading
//! the table means building a new directory and restarting the process.
//!
//! ## Identity resolution
//!
//! [`EmployeeDirectory::resolve_role`] maps an email to the role recorded
//! in the table. Callers that are not in the table keep whatever role they
//! declared. That declared role is **not** verified against any credential:
//! an integrator that forwards an unauthenticated role claim lets callers
//! choose their own privileges.

pub mod directory;
pub mod employee;
pub mod error;

pub use directory::EmployeeDirectory;
pub use employee::{EmployeeId, EmployeeRecord};
pub use error::DirectoryError;
