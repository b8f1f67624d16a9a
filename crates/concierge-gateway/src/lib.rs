//! # concierge-gateway
//!
//! The compliance-aware pipeline in front of the employee table.
//!
//! Every request runs the same path:
//!
//! ```text
//! AccessRequest
//!     -> PolicyEngine::evaluate      (pure, deterministic)
//!        + CitationEnricher          (concurrent, bounded, best effort)
//!     -> AccessGrant | AccessDenial
//!     -> DataProjector::project      (grant only, column- and row-restricted)
//!     -> AuditLog::append            (before any row leaves)
//!     -> Outcome::Released | Outcome::Denied
//! ```
//!
//! Rows are never released without an audit entry: if the audit write fails
//! the request fails with [`GatewayError::AuditFailed`] and the rows are
//! dropped.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use concierge_gateway::{Concierge, ConciergeConfig, Filters, Outcome};
//! use concierge_policy::{AccessRequest, Resource};
//!
//! let config = ConciergeConfig::load(".")?;
//! let concierge = Concierge::from_config(&config, None)?;
//!
//! let request = AccessRequest::new("grace.patel@company.com", "HR", Resource::Salary, "read")
//!     .with_target(101);
//! match concierge.handle(request, Filters::new())? {
//!     Outcome::Released(release) => println!("{} rows", release.rows.len()),
//!     Outcome::Denied(denied) => println!("denied: {}", denied.decision.reason()),
//! }
//! # Ok::<(), concierge_gateway::GatewayError>(())
//! ```

pub mod citation;
pub mod concierge;
pub mod config;
pub mod error;
pub mod projector;

pub use citation::{
    CatalogRetriever, CitationEnricher, PolicyDocument, PolicyRetriever, RetrievalError,
    RetrievalResponse,
};
pub use concierge::{
    AccessDenial, AccessGrant, Concierge, Denied, Evaluation, GrantScope, Outcome, PendingRelease,
    Release,
};
pub use config::ConciergeConfig;
pub use error::GatewayError;
pub use projector::{projection, DataProjector, Filters, Row};
