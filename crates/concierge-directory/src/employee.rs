// employee.rs - Employee record data model.
//
// One row of the employee table. Column names match the CSV headers and the
// keys used in projected rows, so `column()` is the single place that maps a
// column name to a value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Employee identifier as it appears in the `employee_id` column.
pub type EmployeeId = i64;

/// A single employee, as loaded from the employee table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmployeeRecord {
    pub employee_id: EmployeeId,
    pub name: String,
    pub email: String,
    pub department: String,
    pub role: String,
    /// The employee's direct manager. Empty in the CSV for the top of the tree.
    pub manager_id: Option<EmployeeId>,
    pub salary: u64,
    pub performance_rating: f64,
    pub performance_summary: String,
    pub home_city: String,
}

impl EmployeeRecord {
    /// Every column of the table, in source order.
    pub const COLUMNS: &'static [&'static str] = &[
        "employee_id",
        "name",
        "email",
        "department",
        "role",
        "manager_id",
        "salary",
        "performance_rating",
        "performance_summary",
        "home_city",
    ];

    /// Look up a column by name. Unknown columns return `None`; an absent
    /// `manager_id` is `Some(Value::Null)`.
    pub fn column(&self, name: &str) -> Option<Value> {
        let value = match name {
            "employee_id" => Value::from(self.employee_id),
            "name" => Value::from(self.name.as_str()),
            "email" => Value::from(self.email.as_str()),
            "department" => Value::from(self.department.as_str()),
            "role" => Value::from(self.role.as_str()),
            "manager_id" => self.manager_id.map(Value::from).unwrap_or(Value::Null),
            "salary" => Value::from(self.salary),
            "performance_rating" => Value::from(self.performance_rating),
            "performance_summary" => Value::from(self.performance_summary.as_str()),
            "home_city" => Value::from(self.home_city.as_str()),
            _ => return None,
        };
        Some(value)
    }
}
