// Command modules and the request flags they share.

pub mod audit;
pub mod check;
pub mod request;

use std::sync::Arc;

use clap::Args;
use concierge_gateway::{CatalogRetriever, Concierge, ConciergeConfig};
use concierge_policy::{AccessRequest, Resource};
use serde_json::Value;

/// Flags describing one access request.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Requester email.
    #[arg(long)]
    pub email: String,
    /// Requester's declared role (only used if the email is unknown).
    #[arg(long)]
    pub role: String,
    /// Resource name: directory, salary, performance_summary, financial_report.
    #[arg(long)]
    pub resource: String,
    #[arg(long, default_value = "read")]
    pub action: String,
    /// Target employee id.
    #[arg(long)]
    pub target: Option<i64>,
    /// Request context entry (repeatable), e.g. report_type=quarterly.
    #[arg(long = "context", value_name = "KEY=VALUE", value_parser = parse_pair)]
    pub context: Vec<(String, Value)>,
}

impl RequestArgs {
    pub fn to_request(&self) -> AccessRequest {
        let mut request = AccessRequest::new(
            &self.email,
            &self.role,
            Resource::parse(&self.resource),
            &self.action,
        );
        if let Some(target) = self.target {
            request = request.with_target(target);
        }
        for (key, value) in &self.context {
            request = request.with_context(key, value.clone());
        }
        request
    }
}

/// Parse `key=value`. The value is read as JSON when it parses as JSON
/// (`101`, `true`, `null`), otherwise it is taken as a plain string.
pub fn parse_pair(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Build the full pipeline, with handbook citations.
pub fn open_concierge(config: &ConciergeConfig) -> anyhow::Result<Concierge> {
    Ok(Concierge::from_config(
        config,
        Some(Arc::new(CatalogRetriever::handbook())),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pair_values_are_typed_when_possible() {
        assert_eq!(
            parse_pair("employee_id=101").unwrap(),
            ("employee_id".to_string(), json!(101))
        );
        assert_eq!(
            parse_pair("manager_id=null").unwrap(),
            ("manager_id".to_string(), Value::Null)
        );
        assert_eq!(
            parse_pair("department=Engineering").unwrap(),
            ("department".to_string(), json!("Engineering"))
        );
        assert_eq!(
            parse_pair("home_city=New York").unwrap(),
            ("home_city".to_string(), json!("New York"))
        );
    }

    #[test]
    fn pair_keeps_equals_in_value() {
        assert_eq!(
            parse_pair("note=a=b").unwrap(),
            ("note".to_string(), json!("a=b"))
        );
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert!(parse_pair("department").is_err());
        assert!(parse_pair("=Engineering").is_err());
    }

    #[test]
    fn args_build_a_request() {
        let args = RequestArgs {
            email: "priya.nair@company.com".to_string(),
            role: "Executive".to_string(),
            resource: "financial_report".to_string(),
            action: "read".to_string(),
            target: None,
            context: vec![("report_type".to_string(), json!("quarterly"))],
        };
        let request = args.to_request();
        assert_eq!(request.resource, Resource::FinancialReport);
        assert_eq!(request.context.get("report_type"), Some(&json!("quarterly")));
        assert!(request.target_employee_id.is_none());
    }
}
