// entry.rs - Audit entry data model.
//
// One entry per request: who asked, for what, what was decided, under which
// policy section, and how many rows left the system. Entries are linked by
// `previous_hash` once they are written.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column -> exact-match value filters that accompanied the request.
pub type AuditFilters = BTreeMap<String, serde_json::Value>;

/// The recorded outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    Allow,
    Deny,
}

impl From<bool> for AuditDecision {
    fn from(allow: bool) -> Self {
        if allow {
            Self::Allow
        } else {
            Self::Deny
        }
    }
}

impl fmt::Display for AuditDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// A single audit entry: one line in the JSONL audit log.
///
/// `timestamp` may be left empty by the caller; [`AuditLog::append`](crate::AuditLog::append)
/// fills it in. `previous_hash` is always set by the log and any value
/// supplied by the caller is overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the decision was made (UTC).
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub user_email: String,
    /// The role the decision was evaluated against.
    pub role: String,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub filters: AuditFilters,
    pub decision: AuditDecision,
    /// Governing section, e.g. "HR-1.1". Absent for unknown resources.
    #[serde(default)]
    pub policy_section: Option<String>,
    #[serde(default = "default_policy_ref")]
    pub policy_ref: String,
    /// Number of rows released to the caller (0 for denials).
    #[serde(default)]
    pub rows_returned: usize,
    /// SHA-256 of the previous line in the log. None for the first entry.
    #[serde(default)]
    pub previous_hash: Option<String>,
}

fn default_policy_ref() -> String {
    "Policies".to_string()
}

impl AuditEntry {
    /// Create an entry with no filters, no section, and zero rows.
    /// The timestamp is assigned when the entry is appended.
    pub fn new(
        user_email: impl Into<String>,
        role: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
        decision: AuditDecision,
    ) -> Self {
        Self {
            timestamp: None,
            user_email: user_email.into(),
            role: role.into(),
            resource: resource.into(),
            action: action.into(),
            filters: AuditFilters::new(),
            decision,
            policy_section: None,
            policy_ref: default_policy_ref(),
            rows_returned: 0,
            previous_hash: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_filters(mut self, filters: AuditFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.policy_section = Some(section.into());
        self
    }

    pub fn with_policy_ref(mut self, policy_ref: impl Into<String>) -> Self {
        self.policy_ref = policy_ref.into();
        self
    }

    pub fn with_rows_returned(mut self, rows: usize) -> Self {
        self.rows_returned = rows;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_serializes_as_lowercase() {
        assert_eq!(
            serde_json::to_string(&AuditDecision::Allow).unwrap(),
            "\"allow\""
        );
        assert_eq!(AuditDecision::from(false), AuditDecision::Deny);
        assert_eq!(AuditDecision::Deny.to_string(), "deny");
    }

    #[test]
    fn caller_mapping_with_defaults_parses() {
        // The shape an orchestrator sends: no timestamp, no hash.
        let entry: AuditEntry = serde_json::from_value(serde_json::json!({
            "user_email": "grace.patel@company.com",
            "role": "HR",
            "resource": "performance_summary",
            "action": "read",
            "filters": {"employee_id": 101},
            "decision": "allow",
            "policy_section": "HR-1.2",
            "rows_returned": 1
        }))
        .unwrap();
        assert!(entry.timestamp.is_none());
        assert_eq!(entry.policy_ref, "Policies");
        assert_eq!(entry.filters["employee_id"], 101);
        assert_eq!(entry.decision, AuditDecision::Allow);
    }

    #[test]
    fn entry_has_exactly_the_recorded_fields() {
        let entry = AuditEntry::new("a@b.com", "HR", "salary", "read", AuditDecision::Deny);
        let json = serde_json::to_value(&entry).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "action",
                "decision",
                "filters",
                "policy_ref",
                "policy_section",
                "previous_hash",
                "resource",
                "role",
                "rows_returned",
                "timestamp",
                "user_email",
            ]
        );
    }
}
