// resource.rs - The closed set of governed resources.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A resource a caller can ask about.
///
/// Parsing is total: any name outside the known set becomes
/// [`Resource::Unknown`], which always denies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Resource {
    Directory,
    Salary,
    PerformanceSummary,
    FinancialReport,
    /// Unrecognized resource name, kept verbatim for audit records.
    Unknown(String),
}

impl Resource {
    /// Parse a resource name. Matching is exact and case-sensitive.
    pub fn parse(name: &str) -> Self {
        match name {
            "directory" => Self::Directory,
            "salary" => Self::Salary,
            "performance_summary" => Self::PerformanceSummary,
            "financial_report" => Self::FinancialReport,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Directory => "directory",
            Self::Salary => "salary",
            Self::PerformanceSummary => "performance_summary",
            Self::FinancialReport => "financial_report",
            Self::Unknown(name) => name,
        }
    }

    /// The policy section that governs this resource.
    pub fn policy_section(&self) -> Option<&'static str> {
        match self {
            Self::Directory => Some("GEN-1.1"),
            Self::Salary => Some("HR-1.1"),
            Self::PerformanceSummary => Some("HR-1.2"),
            Self::FinancialReport => Some("FIN-1.1"),
            Self::Unknown(_) => None,
        }
    }
}

impl From<String> for Resource {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<Resource> for String {
    fn from(resource: Resource) -> Self {
        resource.as_str().to_string()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_parse() {
        assert_eq!(Resource::parse("salary"), Resource::Salary);
        assert_eq!(
            Resource::parse("performance_summary"),
            Resource::PerformanceSummary
        );
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert_eq!(
            Resource::parse("Salary"),
            Resource::Unknown("Salary".to_string())
        );
    }

    #[test]
    fn unknown_name_survives_serialization() {
        let json = serde_json::to_string(&Resource::parse("payroll_export")).unwrap();
        assert_eq!(json, "\"payroll_export\"");
        let back: Resource = serde_json::from_str("\"financial_report\"").unwrap();
        assert_eq!(back, Resource::FinancialReport);
    }

    #[test]
    fn unknown_resource_has_no_section() {
        assert_eq!(Resource::parse("x").policy_section(), None);
        assert_eq!(Resource::Salary.policy_section(), Some("HR-1.1"));
    }
}
