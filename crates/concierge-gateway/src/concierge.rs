// concierge.rs - The decision -> fetch -> audit pipeline.
//
// The pipeline is enforced by types rather than by caller discipline:
//
// 1. `evaluate()` returns either an `AccessGrant` or an `AccessDenial`.
//    Neither can be built outside this module, and a grant is single use.
// 2. `fetch()` consumes a grant and returns a `PendingRelease`. The rows
//    inside it are not reachable by the caller. A grant decided for one
//    employee only ever fetches that employee's row.
// 3. `record()` writes the audit entry and only then hands the rows out.
//    If the write fails the rows are dropped (fail closed).
//
// Denials go straight to `record_denial()`. `handle()` runs all of it.

use std::sync::Arc;

use concierge_audit::{AuditEntry, AuditLog};
use concierge_directory::{EmployeeDirectory, EmployeeId};
use concierge_policy::{AccessRequest, Decision, EvaluationTrace, PolicyEngine, Resource};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::citation::{CitationEnricher, PendingCitation, PolicyRetriever};
use crate::config::ConciergeConfig;
use crate::error::GatewayError;
use crate::projector::{values_match, DataProjector, Filters, Row};

const EMPLOYEE_ID: &str = "employee_id";

/// The rows an [`AccessGrant`] covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantScope {
    /// Every row matching the caller's filters.
    AllRows,
    /// Only the row of this employee.
    Employee(EmployeeId),
}

impl GrantScope {
    /// Salary and performance requests that name a target are decided for
    /// that target alone.
    fn for_request(request: &AccessRequest) -> Self {
        match (&request.resource, request.target_employee_id) {
            (Resource::Salary | Resource::PerformanceSummary, Some(target)) => {
                Self::Employee(target)
            }
            _ => Self::AllRows,
        }
    }

    /// Pin `employee_id` to the granted employee. A caller filter naming
    /// anyone else is rejected rather than silently replaced.
    fn bind(self, mut filters: Filters) -> Result<Filters, GatewayError> {
        let Self::Employee(granted) = self else {
            return Ok(filters);
        };
        let bound = Value::from(granted);
        match filters.get(EMPLOYEE_ID) {
            Some(requested) if !values_match(requested, &bound) => Err(GatewayError::OutOfScope {
                granted,
                requested: requested.clone(),
            }),
            _ => {
                filters.insert(EMPLOYEE_ID.to_string(), bound);
                Ok(filters)
            }
        }
    }
}

/// Proof that a request was allowed by a specific [`Concierge`].
///
/// Not `Clone`: a grant authorizes exactly one fetch.
#[derive(Debug)]
pub struct AccessGrant {
    id: Uuid,
    issuer: Uuid,
    scope: GrantScope,
    request: AccessRequest,
    role: String,
    decision: Decision,
}

impl AccessGrant {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scope(&self) -> GrantScope {
        self.scope
    }

    pub fn request(&self) -> &AccessRequest {
        &self.request
    }

    pub fn decision(&self) -> &Decision {
        &self.decision
    }
}

/// A denied request, waiting to be recorded.
#[derive(Debug)]
pub struct AccessDenial {
    issuer: Uuid,
    request: AccessRequest,
    role: String,
    decision: Decision,
}

impl AccessDenial {
    pub fn request(&self) -> &AccessRequest {
        &self.request
    }

    pub fn decision(&self) -> &Decision {
        &self.decision
    }
}

/// The result of [`Concierge::evaluate`].
#[derive(Debug)]
pub enum Evaluation {
    Granted(AccessGrant),
    Denied(AccessDenial),
}

impl Evaluation {
    pub fn decision(&self) -> &Decision {
        match self {
            Self::Granted(grant) => &grant.decision,
            Self::Denied(denial) => &denial.decision,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// The role the decision was evaluated against.
    pub fn role(&self) -> &str {
        match self {
            Self::Granted(grant) => &grant.role,
            Self::Denied(denial) => &denial.role,
        }
    }
}

/// Rows fetched under a grant, held until the audit entry is written.
#[derive(Debug)]
pub struct PendingRelease {
    grant: AccessGrant,
    filters: Filters,
    rows: Vec<Row>,
}

impl PendingRelease {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn decision(&self) -> &Decision {
        &self.grant.decision
    }
}

/// Rows released to the caller, with the audit entry that covers them.
#[derive(Debug, Clone, Serialize)]
pub struct Release {
    pub decision: Decision,
    pub rows: Vec<Row>,
    pub entry: AuditEntry,
}

/// A recorded denial.
#[derive(Debug, Clone, Serialize)]
pub struct Denied {
    pub decision: Decision,
    pub entry: AuditEntry,
}

/// The result of [`Concierge::handle`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Released(Release),
    Denied(Denied),
}

impl Outcome {
    pub fn decision(&self) -> &Decision {
        match self {
            Self::Released(release) => &release.decision,
            Self::Denied(denied) => &denied.decision,
        }
    }
}

/// Owns the engine, projector, citation enricher and audit log.
///
/// `Concierge` is `Send + Sync`; requests share nothing but the audit log.
#[derive(Debug)]
pub struct Concierge {
    id: Uuid,
    engine: PolicyEngine,
    projector: DataProjector,
    citations: Option<CitationEnricher>,
    audit: AuditLog,
}

impl Concierge {
    /// Build a pipeline over an employee snapshot and an audit log.
    pub fn new(directory: Arc<EmployeeDirectory>, audit: AuditLog) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine: PolicyEngine::new(Arc::clone(&directory)),
            projector: DataProjector::new(directory),
            citations: None,
            audit,
        }
    }

    /// Load the employee table and wire the audit log from `config`.
    ///
    /// The audit log is created on first append.
    pub fn from_config(
        config: &ConciergeConfig,
        retriever: Option<Arc<dyn PolicyRetriever>>,
    ) -> Result<Self, GatewayError> {
        let directory = Arc::new(EmployeeDirectory::load_csv(&config.employees_csv)?);
        let mut concierge = Self::new(directory, AuditLog::new(&config.audit_log))
            .with_policy_ref(config.policy_ref.clone());
        if let Some(retriever) = retriever.filter(|_| config.citations_enabled) {
            let enricher = CitationEnricher::new(retriever, config.citation_timeout())
                .with_max_in_flight(config.citation_max_in_flight);
            concierge = concierge.with_citations(enricher);
        }
        Ok(concierge)
    }

    pub fn with_policy_ref(mut self, policy_ref: impl Into<String>) -> Self {
        self.engine = self.engine.with_policy_ref(policy_ref);
        self
    }

    pub fn with_citations(mut self, enricher: CitationEnricher) -> Self {
        self.citations = Some(enricher);
        self
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Evaluate with a citation, without issuing a grant or auditing.
    ///
    /// The citation query runs while the rules are evaluated; its outcome
    /// never changes `allow` or `reasons`.
    pub fn decide(&self, request: &AccessRequest) -> EvaluationTrace {
        let (role, _) = self.engine.effective_role(request);
        let pending = self
            .citations
            .as_ref()
            .and_then(|c| c.start(&request.resource, role));

        let mut trace = self.engine.evaluate_with_trace(request);
        if let Some(citation) = pending.and_then(PendingCitation::wait) {
            trace.decision = trace.decision.with_citation(citation);
        }
        trace
    }

    /// Evaluate a request and issue a grant or a denial.
    pub fn evaluate(&self, request: AccessRequest) -> Evaluation {
        let trace = self.decide(&request);
        if trace.decision.allow {
            Evaluation::Granted(AccessGrant {
                id: Uuid::new_v4(),
                issuer: self.id,
                scope: GrantScope::for_request(&request),
                request,
                role: trace.role,
                decision: trace.decision,
            })
        } else {
            Evaluation::Denied(AccessDenial {
                issuer: self.id,
                request,
                role: trace.role,
                decision: trace.decision,
            })
        }
    }

    /// Project the granted resource within the grant's scope. Consumes the
    /// grant.
    pub fn fetch(
        &self,
        grant: AccessGrant,
        filters: Filters,
    ) -> Result<PendingRelease, GatewayError> {
        if grant.issuer != self.id {
            tracing::warn!(grant_id = %grant.id, "rejected grant from another concierge");
            return Err(GatewayError::ForeignGrant);
        }
        let filters = grant.scope.bind(filters).inspect_err(|e| {
            tracing::warn!(
                grant_id = %grant.id,
                user_email = %grant.request.user_email,
                error = %e,
                "rejected filters outside the grant"
            );
        })?;
        let rows = self.projector.project(&grant.request.resource, &filters);
        tracing::debug!(
            grant_id = %grant.id,
            resource = %grant.request.resource,
            rows = rows.len(),
            "rows projected"
        );
        Ok(PendingRelease {
            grant,
            filters,
            rows,
        })
    }

    /// Audit the release, then hand out the rows.
    ///
    /// On audit failure the rows are dropped and `AuditFailed` is returned.
    pub fn record(&self, pending: PendingRelease) -> Result<Release, GatewayError> {
        let PendingRelease {
            grant,
            filters,
            rows,
        } = pending;
        if grant.issuer != self.id {
            return Err(GatewayError::ForeignGrant);
        }

        let mut entry = audit_entry(
            &grant.request,
            &grant.role,
            &grant.decision,
            filters,
            rows.len(),
        );
        if let Err(e) = self.audit.append(&mut entry) {
            tracing::warn!(
                grant_id = %grant.id,
                withheld_rows = rows.len(),
                error = %e,
                "audit write failed, withholding data"
            );
            return Err(e.into());
        }

        tracing::info!(
            grant_id = %grant.id,
            user_email = %grant.request.user_email,
            resource = %grant.request.resource,
            rows = rows.len(),
            "data released"
        );
        Ok(Release {
            decision: grant.decision,
            rows,
            entry,
        })
    }

    /// Audit a denial with no filters.
    pub fn record_denial(&self, denial: AccessDenial) -> Result<Denied, GatewayError> {
        self.write_denial(denial, Filters::new())
    }

    /// Run the whole pipeline for one request.
    pub fn handle(
        &self,
        request: AccessRequest,
        filters: Filters,
    ) -> Result<Outcome, GatewayError> {
        match self.evaluate(request) {
            Evaluation::Granted(grant) => {
                let pending = self.fetch(grant, filters)?;
                Ok(Outcome::Released(self.record(pending)?))
            }
            Evaluation::Denied(denial) => {
                Ok(Outcome::Denied(self.write_denial(denial, filters)?))
            }
        }
    }

    fn write_denial(
        &self,
        denial: AccessDenial,
        filters: Filters,
    ) -> Result<Denied, GatewayError> {
        if denial.issuer != self.id {
            return Err(GatewayError::ForeignGrant);
        }
        let mut entry = audit_entry(&denial.request, &denial.role, &denial.decision, filters, 0);
        self.audit.append(&mut entry)?;
        Ok(Denied {
            decision: denial.decision,
            entry,
        })
    }
}

fn audit_entry(
    request: &AccessRequest,
    role: &str,
    decision: &Decision,
    filters: Filters,
    rows_returned: usize,
) -> AuditEntry {
    let entry = AuditEntry::new(
        &request.user_email,
        role,
        request.resource.as_str(),
        &request.action,
        decision.allow.into(),
    )
    .with_filters(filters)
    .with_policy_ref(&decision.policy_ref)
    .with_rows_returned(rows_returned);

    match &decision.policy_section {
        Some(section) => entry.with_section(section),
        None => entry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    const TABLE: &str = "\
employee_id,name,email,department,role,manager_id,salary,performance_rating,performance_summary,home_city
101,John Doe,john.doe@company.com,Engineering,Engineer,,132000,4.1,Steady,Seattle
103,Grace Patel,grace.patel@company.com,People,HR,,120000,4.8,Trusted,Austin
";

    fn concierge(dir: &std::path::Path) -> Concierge {
        let directory = Arc::new(EmployeeDirectory::from_reader(TABLE.as_bytes()).unwrap());
        Concierge::new(directory, AuditLog::new(dir.join("audit.jsonl")))
    }

    fn salary_request(email: &str, role: &str) -> AccessRequest {
        AccessRequest::new(email, role, Resource::Salary, "read").with_target(101)
    }

    fn grant(c: &Concierge, request: AccessRequest) -> AccessGrant {
        match c.evaluate(request) {
            Evaluation::Granted(grant) => grant,
            other => panic!("expected a grant, got {:?}", other),
        }
    }

    fn filters(pairs: &[(&str, Value)]) -> Filters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn grant_from_another_instance_is_rejected() {
        let dir = tempdir().unwrap();
        let issuer = concierge(dir.path());
        let other = concierge(dir.path());

        let grant = grant(&issuer, salary_request("grace.patel@company.com", "HR"));
        assert!(matches!(
            other.fetch(grant, Filters::new()),
            Err(GatewayError::ForeignGrant)
        ));
    }

    #[test]
    fn pending_release_reports_count_only() {
        let dir = tempdir().unwrap();
        let c = concierge(dir.path());
        let grant = grant(&c, salary_request("grace.patel@company.com", "HR"));
        let pending = c.fetch(grant, Filters::new()).unwrap();
        assert_eq!(pending.row_count(), 1);
        assert!(pending.decision().allow);
        // Nothing is on disk until record().
        assert!(!dir.path().join("audit.jsonl").exists());

        let release = c.record(pending).unwrap();
        assert_eq!(release.rows.len(), 1);
        assert_eq!(release.entry.rows_returned, 1);
        assert_eq!(release.entry.filters["employee_id"], json!(101));
        assert_eq!(release.entry.policy_section.as_deref(), Some("HR-1.1"));
    }

    #[test]
    fn targeted_grant_is_scoped_to_the_target() {
        let dir = tempdir().unwrap();
        let c = concierge(dir.path());

        let targeted = grant(&c, salary_request("grace.patel@company.com", "HR"));
        assert_eq!(targeted.scope(), GrantScope::Employee(101));

        let untargeted = grant(
            &c,
            AccessRequest::new("grace.patel@company.com", "HR", Resource::Salary, "read"),
        );
        assert_eq!(untargeted.scope(), GrantScope::AllRows);
        assert_eq!(c.fetch(untargeted, Filters::new()).unwrap().row_count(), 2);

        let directory = grant(
            &c,
            AccessRequest::new("john.doe@company.com", "Engineer", Resource::Directory, "read")
                .with_target(103),
        );
        assert_eq!(directory.scope(), GrantScope::AllRows);
    }

    #[test]
    fn filter_for_another_employee_is_rejected() {
        let dir = tempdir().unwrap();
        let c = concierge(dir.path());
        let grant = grant(&c, salary_request("grace.patel@company.com", "HR"));

        match c.fetch(grant, filters(&[("employee_id", json!(103))])) {
            Err(GatewayError::OutOfScope { granted, requested }) => {
                assert_eq!(granted, 101);
                assert_eq!(requested, json!(103));
            }
            other => panic!("expected OutOfScope, got {:?}", other),
        }
        assert!(!dir.path().join("audit.jsonl").exists());
    }

    #[test]
    fn filter_for_the_granted_employee_is_kept() {
        let dir = tempdir().unwrap();
        let c = concierge(dir.path());
        let grant = grant(&c, salary_request("grace.patel@company.com", "HR"));

        let pending = c
            .fetch(grant, filters(&[("employee_id", json!(101.0))]))
            .unwrap();
        assert_eq!(pending.row_count(), 1);
    }

    #[test]
    fn denial_is_recorded_with_zero_rows() {
        let dir = tempdir().unwrap();
        let c = concierge(dir.path());
        let Evaluation::Denied(denial) =
            c.evaluate(salary_request("john.doe@company.com", "Engineer"))
        else {
            panic!("expected a denial");
        };
        let denied = c.record_denial(denial).unwrap();
        assert!(!denied.decision.allow);
        assert_eq!(denied.entry.rows_returned, 0);
        assert_eq!(denied.entry.role, "Engineer");
        assert_eq!(
            AuditLog::read_all(dir.path().join("audit.jsonl"))
                .unwrap()
                .len(),
            1
        );
    }
}
