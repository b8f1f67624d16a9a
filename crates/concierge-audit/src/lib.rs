//! # concierge-audit
//!
//! Append-only audit trail for access decisions.
//!
//! Every decision (and every data release that follows an allow) is written
//! as one [`AuditEntry`] per line in a JSONL file. Each line carries the
//! SHA-256 of the line before it, so deleting, reordering or editing a past
//! entry breaks [`AuditLog::verify_chain`].
//!
//! [`AuditLog`] has `append` and read-only helpers. There is no update or
//! delete operation.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use concierge_audit::{AuditDecision, AuditEntry, AuditLog};
//!
//! let log = AuditLog::open("logs/audit.jsonl").unwrap();
//! let mut entry = AuditEntry::new(
//!     "grace.patel@company.com",
//!     "HR",
//!     "salary",
//!     "read",
//!     AuditDecision::Allow,
//! )
//! .with_section("HR-1.1")
//! .with_rows_returned(1);
//! log.append(&mut entry).unwrap();
//! ```

pub mod entry;
pub mod error;
pub mod hasher;
pub mod log;

pub use entry::{AuditDecision, AuditEntry, AuditFilters};
pub use error::AuditError;
pub use log::AuditLog;
