// pipeline.rs - End-to-end tests of the decision -> fetch -> audit pipeline.
//
// Each test builds a real Concierge over an in-memory employee table and an
// on-disk audit log in a temp directory, then checks:
//
//   - decisions match the HR / finance rules
//   - released rows carry only the resource's columns
//   - every request leaves exactly one audit line, with an intact hash chain
//   - an audit failure withholds the rows
//   - the citation collaborator can never change or fail a decision
//   - stuck citation lookups are capped

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use tempfile::tempdir;

use concierge_audit::{AuditDecision, AuditLog};
use concierge_directory::EmployeeDirectory;
use concierge_gateway::{
    CatalogRetriever, CitationEnricher, Concierge, ConciergeConfig, Evaluation, Filters,
    GatewayError, Outcome, PolicyRetriever, RetrievalError, RetrievalResponse,
};
use concierge_policy::{AccessRequest, Resource};

const EMPLOYEES: &str = "\
employee_id,name,email,department,role,manager_id,salary,performance_rating,performance_summary,home_city
100,Alice Chen,alice.chen@company.com,Engineering,Engineering Manager,,185000,4.6,Leads the platform team,Seattle
101,John Doe,john.doe@company.com,Engineering,Engineer,100,132000,4.1,Reliable delivery on billing,Seattle
102,Maria Lopez,maria.lopez@company.com,Engineering,Senior Engineer,100,158000,4.4,Mentors new hires,Portland
103,Grace Patel,grace.patel@company.com,People,HR,106,120000,4.8,Runs review calibration,Austin
104,Sam Rivera,sam.rivera@company.com,Finance,Finance,107,125000,4.2,Owns quarterly close,Chicago
105,Priya Nair,priya.nair@company.com,Leadership,Executive,,240000,4.7,Sets company direction,New York
106,Helen Brooks,helen.brooks@company.com,People,HR Director,105,175000,4.5,Leads the people team,Austin
107,Victor Wu,victor.wu@company.com,Finance,CFO,105,260000,4.6,Runs finance,New York
";

struct Panicking;
impl PolicyRetriever for Panicking {
    fn query(&self, _text: &str) -> Result<RetrievalResponse, RetrievalError> {
        panic!("retriever crashed")
    }
}

struct Slow;
impl PolicyRetriever for Slow {
    fn query(&self, _text: &str) -> Result<RetrievalResponse, RetrievalError> {
        thread::sleep(Duration::from_secs(5));
        Ok(RetrievalResponse {
            response: "HR-1.1".to_string(),
        })
    }
}

fn directory() -> Arc<EmployeeDirectory> {
    Arc::new(EmployeeDirectory::from_reader(EMPLOYEES.as_bytes()).unwrap())
}

fn salary_of_101(email: &str, role: &str) -> AccessRequest {
    AccessRequest::new(email, role, Resource::Salary, "read").with_target(101)
}

/// HR reads a salary: allowed under HR-1.1, salary columns only, audited.
#[test]
fn hr_salary_read_is_released_and_audited() {
    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("logs").join("audit.jsonl");
    let concierge = Concierge::new(directory(), AuditLog::new(&audit_path));

    // =========================================================
    // STEP 1: Evaluate and release
    // =========================================================
    let outcome = concierge
        .handle(
            salary_of_101("grace.patel@company.com", "HR"),
            Filters::new(),
        )
        .unwrap();

    let release = match outcome {
        Outcome::Released(release) => release,
        other => panic!("expected Released, got {:?}", other),
    };
    assert!(release.decision.allow);
    assert_eq!(release.decision.policy_ref, "Policies");
    assert_eq!(release.decision.policy_section.as_deref(), Some("HR-1.1"));
    assert!(!release.decision.reasons.is_empty());

    // =========================================================
    // STEP 2: Only employee 101's salary columns leave the pipeline
    // =========================================================
    assert_eq!(release.rows.len(), 1);
    let mut keys: Vec<&str> = release.rows[0].keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["employee_id", "name", "salary"]);
    assert_eq!(release.rows[0]["employee_id"], json!(101));

    // =========================================================
    // STEP 3: The audit line matches the release
    // =========================================================
    let entries = AuditLog::read_all(&audit_path).unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.user_email, "grace.patel@company.com");
    assert_eq!(entry.role, "HR");
    assert_eq!(entry.resource, "salary");
    assert_eq!(entry.action, "read");
    assert_eq!(entry.decision, AuditDecision::Allow);
    assert_eq!(entry.policy_section.as_deref(), Some("HR-1.1"));
    assert_eq!(entry.policy_ref, "Policies");
    assert_eq!(entry.rows_returned, 1);
    assert_eq!(entry.filters["employee_id"], json!(101));
    assert!(entry.timestamp.is_some());
    assert_eq!(release.entry, *entry);
}

/// An engineer asking for a salary is denied, and the denial is audited.
#[test]
fn engineer_salary_read_is_denied_and_audited() {
    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let concierge = Concierge::new(directory(), AuditLog::new(&audit_path));

    let outcome = concierge
        .handle(
            salary_of_101("john.doe@company.com", "Engineer"),
            Filters::new(),
        )
        .unwrap();
    let denied = match outcome {
        Outcome::Denied(denied) => denied,
        other => panic!("expected Denied, got {:?}", other),
    };
    assert!(!denied.decision.allow);
    assert_eq!(denied.decision.policy_section.as_deref(), Some("HR-1.1"));

    let entries = AuditLog::read_all(&audit_path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].decision, AuditDecision::Deny);
    assert_eq!(entries[0].rows_returned, 0);
}

/// The directory role wins over a forged declared role.
#[test]
fn declared_role_cannot_escalate_a_known_requester() {
    let dir = tempdir().unwrap();
    let concierge = Concierge::new(directory(), AuditLog::new(dir.path().join("audit.jsonl")));

    let evaluation = concierge.evaluate(salary_of_101("john.doe@company.com", "HR"));
    assert!(!evaluation.is_allowed());
    assert_eq!(evaluation.role(), "Engineer");
}

/// Filters narrow the rows; the audit line records them.
#[test]
fn filters_are_applied_and_recorded() {
    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let concierge = Concierge::new(directory(), AuditLog::new(&audit_path));

    let filters: Filters = [("department".to_string(), json!("Engineering"))]
        .into_iter()
        .collect();
    let outcome = concierge
        .handle(
            AccessRequest::new("john.doe@company.com", "Engineer", Resource::Directory, "read"),
            filters.clone(),
        )
        .unwrap();

    let Outcome::Released(release) = outcome else {
        panic!("directory reads are always allowed");
    };
    assert_eq!(release.rows.len(), 3);
    assert!(release.rows.iter().all(|r| !r.contains_key("salary")));

    let entries = AuditLog::read_all(&audit_path).unwrap();
    assert_eq!(entries[0].filters, filters);
    assert_eq!(entries[0].rows_returned, 3);
    assert_eq!(entries[0].policy_section.as_deref(), Some("GEN-1.1"));
}

fn performance_of(email: &str, role: &str, target: i64) -> AccessRequest {
    AccessRequest::new(email, role, Resource::PerformanceSummary, "read").with_target(target)
}

fn released_ids(outcome: Outcome) -> Vec<serde_json::Value> {
    match outcome {
        Outcome::Released(release) => release
            .rows
            .iter()
            .map(|row| row["employee_id"].clone())
            .collect(),
        other => panic!("expected Released, got {:?}", other),
    }
}

/// Self access to a review releases the requester's own row and nothing else.
#[test]
fn self_access_releases_exactly_one_row() {
    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let concierge = Concierge::new(directory(), AuditLog::new(&audit_path));

    let outcome = concierge
        .handle(
            performance_of("john.doe@company.com", "Engineer", 101),
            Filters::new(),
        )
        .unwrap();
    assert_eq!(released_ids(outcome), vec![json!(101)]);

    let entries = AuditLog::read_all(&audit_path).unwrap();
    assert_eq!(entries[0].rows_returned, 1);
    assert_eq!(entries[0].filters["employee_id"], json!(101));
}

/// A manager reading a direct report's review gets that report only.
#[test]
fn direct_report_access_releases_only_the_report() {
    let dir = tempdir().unwrap();
    let concierge = Concierge::new(directory(), AuditLog::new(dir.path().join("audit.jsonl")));

    let outcome = concierge
        .handle(
            performance_of("alice.chen@company.com", "Engineering Manager", 102),
            Filters::new(),
        )
        .unwrap();
    assert_eq!(released_ids(outcome), vec![json!(102)]);
}

/// Filters cannot widen a targeted grant to another employee.
#[test]
fn filters_cannot_reach_past_the_target() {
    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let concierge = Concierge::new(directory(), AuditLog::new(&audit_path));

    let widened: Filters = [("employee_id".to_string(), json!(103))]
        .into_iter()
        .collect();
    match concierge.handle(
        performance_of("john.doe@company.com", "Engineer", 101),
        widened,
    ) {
        Err(GatewayError::OutOfScope { granted, .. }) => assert_eq!(granted, 101),
        other => panic!("expected OutOfScope, got {:?}", other),
    }
    assert!(!audit_path.exists());

    // Unrelated filters still narrow within the grant.
    let other_name: Filters = [("name".to_string(), json!("Maria Lopez"))]
        .into_iter()
        .collect();
    let outcome = concierge
        .handle(performance_of("john.doe@company.com", "Engineer", 101), other_name)
        .unwrap();
    assert!(released_ids(outcome).is_empty());
}

/// If the audit log cannot be written, no rows are released.
#[test]
fn audit_failure_withholds_rows() {
    let dir = tempdir().unwrap();
    // A regular file where the log directory should be.
    let blocker = dir.path().join("logs");
    fs::write(&blocker, b"not a directory").unwrap();
    let concierge = Concierge::new(directory(), AuditLog::new(blocker.join("audit.jsonl")));

    match concierge.handle(
        salary_of_101("grace.patel@company.com", "HR"),
        Filters::new(),
    ) {
        Err(GatewayError::AuditFailed(_)) => {}
        other => panic!("expected AuditFailed, got {:?}", other),
    }

    // The same holds when the caller drives the steps by hand.
    let Evaluation::Granted(grant) =
        concierge.evaluate(salary_of_101("grace.patel@company.com", "HR"))
    else {
        panic!("expected a grant");
    };
    let pending = concierge.fetch(grant, Filters::new()).unwrap();
    assert_eq!(pending.row_count(), 1);
    assert!(matches!(
        concierge.record(pending),
        Err(GatewayError::AuditFailed(_))
    ));
}

/// The handbook retriever attaches the governing section to the decision.
#[test]
fn citation_is_attached_without_changing_the_decision() {
    let dir = tempdir().unwrap();
    let plain = Concierge::new(directory(), AuditLog::new(dir.path().join("a.jsonl")));
    let cited = Concierge::new(directory(), AuditLog::new(dir.path().join("b.jsonl")))
        .with_citations(CitationEnricher::new(
            Arc::new(CatalogRetriever::handbook()),
            Duration::from_millis(1500),
        ));

    let request = salary_of_101("john.doe@company.com", "Engineer");
    let without = plain.decide(&request).decision;
    let with = cited.decide(&request).decision;

    assert!(with.same_outcome(&without));
    assert!(without.citation.is_none());
    let citation = with.citation.clone().unwrap();
    assert!(citation.contains("HR-1.1"));
    assert!(with.reason().ends_with(&format!("Policy note: {}", citation)));
}

/// A crashing retriever is invisible to the caller.
#[test]
fn panicking_retriever_does_not_affect_decisions() {
    let dir = tempdir().unwrap();
    let concierge = Concierge::new(directory(), AuditLog::new(dir.path().join("audit.jsonl")))
        .with_citations(CitationEnricher::new(
            Arc::new(Panicking),
            Duration::from_millis(1500),
        ));

    let outcome = concierge
        .handle(
            salary_of_101("grace.patel@company.com", "HR"),
            Filters::new(),
        )
        .unwrap();
    assert!(outcome.decision().allow);
    assert!(outcome.decision().citation.is_none());
}

/// A hung retriever costs at most the configured timeout.
#[test]
fn slow_retriever_is_bounded_by_timeout() {
    let dir = tempdir().unwrap();
    let concierge = Concierge::new(directory(), AuditLog::new(dir.path().join("audit.jsonl")))
        .with_citations(CitationEnricher::new(
            Arc::new(Slow),
            Duration::from_millis(100),
        ));

    let started = Instant::now();
    let outcome = concierge
        .handle(
            salary_of_101("john.doe@company.com", "Engineer"),
            Filters::new(),
        )
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!outcome.decision().allow);
    assert!(outcome.decision().citation.is_none());
}

/// A retriever that never answers cannot pile up worker threads.
#[test]
fn hung_retriever_workers_are_capped() {
    let dir = tempdir().unwrap();
    let enricher = CitationEnricher::new(Arc::new(Slow), Duration::from_millis(5))
        .with_max_in_flight(3);
    let concierge = Concierge::new(directory(), AuditLog::new(dir.path().join("audit.jsonl")))
        .with_citations(enricher.clone());

    for _ in 0..20 {
        let outcome = concierge
            .handle(
                salary_of_101("grace.patel@company.com", "HR"),
                Filters::new(),
            )
            .unwrap();
        assert!(outcome.decision().allow);
        assert!(outcome.decision().citation.is_none());
    }
    assert_eq!(enricher.in_flight(), 3);

    // Every request was still decided and audited.
    assert_eq!(
        AuditLog::read_all(dir.path().join("audit.jsonl")).unwrap().len(),
        20
    );
}

/// Concurrent requests each produce one whole line and the chain holds.
#[test]
fn concurrent_requests_keep_the_chain_intact() {
    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let concierge = Arc::new(Concierge::new(directory(), AuditLog::new(&audit_path)));

    let requesters = [
        ("grace.patel@company.com", "HR"),
        ("john.doe@company.com", "Engineer"),
        ("victor.wu@company.com", "CFO"),
        ("alice.chen@company.com", "Engineering Manager"),
    ];
    let handles: Vec<_> = requesters
        .iter()
        .map(|&(email, role)| {
            let concierge = Arc::clone(&concierge);
            thread::spawn(move || {
                for _ in 0..20 {
                    concierge
                        .handle(salary_of_101(email, role), Filters::new())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(AuditLog::verify_chain(&audit_path).unwrap(), 80);
    let entries = AuditLog::read_all(&audit_path).unwrap();
    let allowed = entries
        .iter()
        .filter(|e| e.decision == AuditDecision::Allow)
        .count();
    assert_eq!(allowed, 20);
}

/// `from_config` loads the table from disk and writes where configured.
#[test]
fn from_config_wires_files_under_the_project_root() {
    let root = tempdir().unwrap();
    fs::create_dir_all(root.path().join("data")).unwrap();
    fs::write(root.path().join("data").join("employees.csv"), EMPLOYEES).unwrap();
    fs::write(
        root.path().join(ConciergeConfig::FILE_NAME),
        "policy_ref = \"Handbook 2024\"\ncitations_enabled = false\n",
    )
    .unwrap();

    let config = ConciergeConfig::load(root.path()).unwrap();
    let concierge =
        Concierge::from_config(&config, Some(Arc::new(CatalogRetriever::handbook()))).unwrap();

    let outcome = concierge
        .handle(
            AccessRequest::new(
                "victor.wu@company.com",
                "CFO",
                Resource::FinancialReport,
                "read",
            ),
            Filters::new(),
        )
        .unwrap();
    assert!(outcome.decision().allow);
    assert_eq!(outcome.decision().policy_ref, "Handbook 2024");
    // Citations are disabled in the config.
    assert!(outcome.decision().citation.is_none());

    let entries = AuditLog::read_all(root.path().join("logs").join("audit.jsonl")).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].rows_returned, 0);
    assert_eq!(entries[0].policy_section.as_deref(), Some("FIN-1.1"));
}
