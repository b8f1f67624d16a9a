// projector.rs - Column-restricted views over the employee snapshot.
//
// Each resource has a fixed column set. Filters are exact-match and ANDed;
// a filter on a column outside the resource's projection is ignored (it
// cannot be used to probe hidden columns).
//
// The projector performs no authorization. Inside this crate it is only
// reachable through `Concierge::fetch`, which requires an `AccessGrant`.

use std::collections::BTreeMap;
use std::sync::Arc;

use concierge_directory::{EmployeeDirectory, EmployeeRecord};
use concierge_policy::Resource;
use serde_json::{Map, Value};

/// One projected row: column name -> value.
pub type Row = Map<String, Value>;

/// Column -> exact-match value.
pub type Filters = BTreeMap<String, Value>;

const DIRECTORY_COLUMNS: &[&str] = &[
    "employee_id",
    "name",
    "email",
    "department",
    "role",
    "manager_id",
    "home_city",
];
const SALARY_COLUMNS: &[&str] = &["employee_id", "name", "salary"];
const PERFORMANCE_COLUMNS: &[&str] = &[
    "employee_id",
    "name",
    "performance_rating",
    "performance_summary",
];

/// The columns released for `resource`. Empty for resources with no
/// employee-table projection (financial reports, unknown names).
pub fn projection(resource: &Resource) -> &'static [&'static str] {
    match resource {
        Resource::Directory => DIRECTORY_COLUMNS,
        Resource::Salary => SALARY_COLUMNS,
        Resource::PerformanceSummary => PERFORMANCE_COLUMNS,
        Resource::FinancialReport | Resource::Unknown(_) => &[],
    }
}

/// Produces column-restricted row sets from an injected employee snapshot.
#[derive(Debug, Clone)]
pub struct DataProjector {
    directory: Arc<EmployeeDirectory>,
}

impl DataProjector {
    pub fn new(directory: Arc<EmployeeDirectory>) -> Self {
        Self { directory }
    }

    /// Rows of `resource` matching every applicable filter, in table order.
    pub fn project(&self, resource: &Resource, filters: &Filters) -> Vec<Row> {
        let columns = projection(resource);
        if columns.is_empty() {
            return Vec::new();
        }

        let active: Vec<(&String, &Value)> = filters
            .iter()
            .filter(|(column, _)| columns.contains(&column.as_str()))
            .collect();

        self.directory
            .records()
            .iter()
            .filter(|record| {
                active.iter().all(|(column, wanted)| {
                    record
                        .column(column)
                        .is_some_and(|actual| values_match(&actual, wanted))
                })
            })
            .map(|record| project_row(record, columns))
            .collect()
    }
}

fn project_row(record: &EmployeeRecord, columns: &[&str]) -> Row {
    columns
        .iter()
        .filter_map(|&column| record.column(column).map(|v| (column.to_string(), v)))
        .collect()
}

/// Exact match, except that numbers compare by value (101 == 101.0).
pub(crate) fn values_match(actual: &Value, wanted: &Value) -> bool {
    match (actual, wanted) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => actual == wanted,
    }
}
