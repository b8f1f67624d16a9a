//! # concierge-policy
//!
//! Rule evaluation for access to employee records.
//!
//! The [`PolicyEngine`] is a pure function of its request and the injected
//! [`EmployeeDirectory`](concierge_directory::EmployeeDirectory) snapshot.
//! It never performs I/O, never returns an error, and never allows on
//! failure: anything it cannot verify becomes a deny.
//!
//! ## Rules (first match wins)
//!
//! - **directory**: everyone.
//! - **salary**: HR-class roles only. No self access, no manager exception.
//! - **performance_summary**: HR-class, the employee themself, or a
//!   manager-class role whose direct report is the target.
//! - **financial_report**: Finance, CFO, CEO; Executives for quarterly reports.
//! - anything else: deny with no reasons.

pub mod decision;
pub mod engine;
pub mod error;
pub mod resource;
pub mod role;

pub use decision::{Decision, DEFAULT_POLICY_REF};
pub use engine::{
    AccessRequest, EvaluationStep, EvaluationTrace, PolicyEngine, RequestContext, RoleSource,
};
pub use error::PolicyError;
pub use resource::Resource;
