// engine.rs - Policy rule evaluation.
//
// Every access request passes through `evaluate()`:
//
// 1. Resolve the caller's role from the directory (fall back to the declared role)
// 2. Dispatch on the resource; the first matching rule wins
// 3. Anything that cannot be verified denies
//
// The engine holds an `Arc` to the employee snapshot and nothing else, so it
// is `Send + Sync` and can be shared by any number of threads without locks.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use concierge_directory::{EmployeeDirectory, EmployeeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decision::{Decision, DEFAULT_POLICY_REF};
use crate::error::PolicyError;
use crate::resource::Resource;
use crate::role;

/// Free-form request context (e.g. `{"report_type": "quarterly"}`).
pub type RequestContext = BTreeMap<String, Value>;

const DIRECTORY_ALLOW: &str = "Company directory accessible to all employees (GEN-1.1).";
const PERF_HR: &str = "HR may access all performance reviews (HR-1.2).";
const PERF_SELF: &str = "Employees may access their own reviews (HR-1.2).";
const PERF_MANAGER: &str = "Managers may access reviews for direct reports (HR-1.2).";
const PERF_DENY: &str =
    "Performance reviews are limited to HR, the employee, and their direct manager (HR-1.2).";
const PERF_LOOKUP_FAILED: &str =
    "Unable to verify requester against the employee directory; access denied (HR-1.2).";
const SALARY_ALLOW: &str = "Only HR/Admin may access salary (HR-1.1).";
const SALARY_DENY: &str = "Managers/employees cannot view exact salary (HR-1.1).";
const FINANCE_ALLOW: &str = "Finance/executives may access financial reports (FIN-1.1).";
const EXECUTIVE_QUARTERLY: &str = "Executives may access quarterly summaries (FIN-1.1).";
const FINANCE_DENY: &str = "Non-finance access requires CFO approval (FIN-1.1).";

/// A request to access a resource, as submitted by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub user_email: String,
    /// Role the caller claims. Used only when the email is not in the directory.
    pub user_role: String,
    pub resource: Resource,
    /// The requested action (e.g. "read"). Recorded, not evaluated.
    pub action: String,
    #[serde(default)]
    pub target_employee_id: Option<EmployeeId>,
    #[serde(default)]
    pub context: RequestContext,
}

impl AccessRequest {
    pub fn new(
        user_email: impl Into<String>,
        user_role: impl Into<String>,
        resource: Resource,
        action: impl Into<String>,
    ) -> Self {
        Self {
            user_email: user_email.into(),
            user_role: user_role.into(),
            resource,
            action: action.into(),
            target_employee_id: None,
            context: RequestContext::new(),
        }
    }

    pub fn with_target(mut self, employee_id: EmployeeId) -> Self {
        self.target_employee_id = Some(employee_id);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Where the role used for evaluation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    /// Looked up by email in the employee directory.
    Directory,
    /// Taken from the caller's claim, unverified.
    Declared,
}

impl fmt::Display for RoleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => f.write_str("directory"),
            Self::Declared => f.write_str("declared"),
        }
    }
}

/// One check performed during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationStep {
    /// Which check was performed (e.g. "identity_resolution", "hr_class").
    pub check: String,
    /// What the check found.
    pub outcome: String,
    /// Whether this step decided the request.
    pub terminal: bool,
}

/// A decision together with every check that led to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationTrace {
    pub decision: Decision,
    /// The role the rules were evaluated against.
    pub role: String,
    pub role_source: RoleSource,
    pub steps: Vec<EvaluationStep>,
}

/// The policy engine. Cheap to clone; clones share the same snapshot.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    directory: Arc<EmployeeDirectory>,
    policy_ref: String,
}

impl PolicyEngine {
    pub fn new(directory: Arc<EmployeeDirectory>) -> Self {
        Self {
            directory,
            policy_ref: DEFAULT_POLICY_REF.to_string(),
        }
    }

    /// Override the policy corpus name written into every decision.
    pub fn with_policy_ref(mut self, policy_ref: impl Into<String>) -> Self {
        self.policy_ref = policy_ref.into();
        self
    }

    pub fn directory(&self) -> &Arc<EmployeeDirectory> {
        &self.directory
    }

    /// Resolve the role used for `request`: directory role if the email is
    /// known, otherwise the declared role.
    pub fn effective_role<'a>(&'a self, request: &'a AccessRequest) -> (&'a str, RoleSource) {
        match self.directory.resolve_role(&request.user_email) {
            Some(role) => (role, RoleSource::Directory),
            None => (request.user_role.as_str(), RoleSource::Declared),
        }
    }

    /// Evaluate a request. Deterministic, infallible, and never allows on error.
    pub fn evaluate(&self, request: &AccessRequest) -> Decision {
        self.evaluate_with_trace(request).decision
    }

    /// Evaluate a request and record every check performed.
    pub fn evaluate_with_trace(&self, request: &AccessRequest) -> EvaluationTrace {
        let mut steps = Vec::new();

        let (role, role_source) = self.effective_role(request);
        if role_source == RoleSource::Declared {
            tracing::warn!(
                user_email = %request.user_email,
                declared_role = %role,
                "requester not in employee directory, using unverified declared role"
            );
        }
        steps.push(step(
            "identity_resolution",
            format!("role '{}' ({})", role, role_source),
            false,
        ));

        let decision = match &request.resource {
            Resource::Directory => {
                steps.push(step("resource", "directory is open to all roles", true));
                self.allow(DIRECTORY_ALLOW, &request.resource)
            }
            Resource::Salary => self.salary(role, &mut steps),
            Resource::PerformanceSummary => {
                match self.performance_summary(request, role, &mut steps) {
                    Ok(decision) => decision,
                    Err(e) => {
                        steps.push(step("requester_lookup", format!("failed: {}", e), true));
                        self.deny(vec![PERF_LOOKUP_FAILED], &request.resource)
                    }
                }
            }
            Resource::FinancialReport => self.financial_report(request, role, &mut steps),
            Resource::Unknown(name) => {
                steps.push(step("resource", format!("unknown resource '{}'", name), true));
                self.deny(vec![], &request.resource)
            }
        };

        tracing::info!(
            user_email = %request.user_email,
            role = %role,
            resource = %request.resource,
            action = %request.action,
            allow = decision.allow,
            section = decision.policy_section.as_deref().unwrap_or("-"),
            "policy decision"
        );

        EvaluationTrace {
            decision,
            role: role.to_string(),
            role_source,
            steps,
        }
    }

    fn salary(&self, role: &str, steps: &mut Vec<EvaluationStep>) -> Decision {
        if role::is_hr_class(role) {
            steps.push(step("hr_class", format!("passed: '{}'", role), true));
            self.allow(SALARY_ALLOW, &Resource::Salary)
        } else {
            steps.push(step("hr_class", format!("failed: '{}'", role), true));
            self.deny(vec![SALARY_DENY], &Resource::Salary)
        }
    }

    fn performance_summary(
        &self,
        request: &AccessRequest,
        role: &str,
        steps: &mut Vec<EvaluationStep>,
    ) -> Result<Decision, PolicyError> {
        let resource = &request.resource;

        if role::is_hr_class(role) {
            steps.push(step("hr_class", format!("passed: '{}'", role), true));
            return Ok(self.allow(PERF_HR, resource));
        }
        steps.push(step("hr_class", format!("failed: '{}'", role), false));

        let requester = self
            .directory
            .find_by_email(&request.user_email)
            .ok_or_else(|| PolicyError::RequesterNotFound {
                email: request.user_email.clone(),
            })?;
        steps.push(step(
            "requester_lookup",
            format!("employee {}", requester.employee_id),
            false,
        ));

        let Some(target) = request.target_employee_id else {
            steps.push(step("self_access", "failed: no target employee", true));
            return Ok(self.deny(vec![PERF_DENY], resource));
        };

        if requester.employee_id == target {
            steps.push(step("self_access", "passed", true));
            return Ok(self.allow(PERF_SELF, resource));
        }
        steps.push(step(
            "self_access",
            format!("failed: target {} is not the requester", target),
            false,
        ));

        if role::is_manager_class(role)
            && self.directory.is_direct_report(requester.employee_id, target)
        {
            steps.push(step(
                "direct_report",
                format!("passed: {} reports to {}", target, requester.employee_id),
                true,
            ));
            return Ok(self.allow(PERF_MANAGER, resource));
        }
        steps.push(step(
            "direct_report",
            format!(
                "failed: '{}' is not the direct manager of {}",
                role, target
            ),
            true,
        ));
        Ok(self.deny(vec![PERF_DENY], resource))
    }

    fn financial_report(
        &self,
        request: &AccessRequest,
        role: &str,
        steps: &mut Vec<EvaluationStep>,
    ) -> Decision {
        let resource = &request.resource;

        if role::is_finance_class(role) {
            steps.push(step("finance_class", format!("passed: '{}'", role), true));
            return self.allow(FINANCE_ALLOW, resource);
        }
        steps.push(step("finance_class", format!("failed: '{}'", role), false));

        let report_type = request
            .context
            .get("report_type")
            .and_then(Value::as_str)
            .unwrap_or("");
        if role == role::EXECUTIVE && report_type == "quarterly" {
            steps.push(step("executive_quarterly", "passed", true));
            return self.allow(EXECUTIVE_QUARTERLY, resource);
        }
        steps.push(step(
            "executive_quarterly",
            format!("failed: role '{}', report_type '{}'", role, report_type),
            true,
        ));
        self.deny(vec![FINANCE_DENY], resource)
    }

    fn allow(&self, reason: &str, resource: &Resource) -> Decision {
        Decision::allow(reason, resource.policy_section(), &self.policy_ref)
    }

    fn deny(&self, reasons: Vec<&str>, resource: &Resource) -> Decision {
        Decision::deny(
            reasons.into_iter().map(str::to_string).collect(),
            resource.policy_section(),
            &self.policy_ref,
        )
    }
}

fn step(check: &str, outcome: impl Into<String>, terminal: bool) -> EvaluationStep {
    EvaluationStep {
        check: check.to_string(),
        outcome: outcome.into(),
        terminal,
    }
}
