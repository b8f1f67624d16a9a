// decision.rs - The result of evaluating an access request.

use serde::{Deserialize, Serialize};

/// Name of the policy corpus every decision cites.
pub const DEFAULT_POLICY_REF: &str = "Policies";

/// An allow/deny outcome with its explanation.
///
/// Invariant: an allowed decision always has at least one reason. The
/// constructors are the only way to build one inside this crate; the
/// citation is decorative and is ignored by [`Decision::same_outcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    /// Rule explanations, in the order the rules were applied.
    pub reasons: Vec<String>,
    pub policy_ref: String,
    /// The section that governed the decision (e.g. "HR-1.1").
    #[serde(default)]
    pub policy_section: Option<String>,
    /// Optional citation from the policy retriever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
}

impl Decision {
    pub(crate) fn allow(
        reason: impl Into<String>,
        section: Option<&str>,
        policy_ref: &str,
    ) -> Self {
        Self {
            allow: true,
            reasons: vec![reason.into()],
            policy_ref: policy_ref.to_string(),
            policy_section: section.map(str::to_string),
            citation: None,
        }
    }

    pub(crate) fn deny(reasons: Vec<String>, section: Option<&str>, policy_ref: &str) -> Self {
        Self {
            allow: false,
            reasons,
            policy_ref: policy_ref.to_string(),
            policy_section: section.map(str::to_string),
            citation: None,
        }
    }

    /// Attach a citation. Empty or whitespace-only text is dropped.
    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        let citation = citation.into();
        let trimmed = citation.trim();
        if !trimmed.is_empty() {
            self.citation = Some(trimmed.to_string());
        }
        self
    }

    /// Human-readable explanation: the reasons joined by spaces, with the
    /// citation (if any) appended as a policy note.
    pub fn reason(&self) -> String {
        let mut text = self.reasons.join(" ");
        if let Some(citation) = &self.citation {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str("Policy note: ");
            text.push_str(citation);
        }
        text
    }

    /// Compare everything except the citation.
    pub fn same_outcome(&self, other: &Decision) -> bool {
        self.allow == other.allow
            && self.reasons == other.reasons
            && self.policy_ref == other.policy_ref
            && self.policy_section == other.policy_section
    }

    /// "allow" or "deny", as written to the audit log.
    pub fn verdict(&self) -> &'static str {
        if self.allow {
            "allow"
        } else {
            "deny"
        }
    }
}
