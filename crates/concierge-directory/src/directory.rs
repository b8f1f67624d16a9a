// directory.rs - The immutable employee snapshot and identity resolver.
//
// The directory is built once from the tabular source and then only read.
// Records keep their source order (projections return rows in that order);
// two hash indexes give O(1) lookup by id and by email.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::employee::{EmployeeId, EmployeeRecord};
use crate::error::DirectoryError;

/// Read-only employee table keyed by `employee_id` and by `email`.
///
/// There is no `insert` or `reload`: share it behind an
/// `Arc<EmployeeDirectory>` and every concurrent reader sees the same data.
#[derive(Debug, Default)]
pub struct EmployeeDirectory {
    records: Vec<EmployeeRecord>,
    by_id: HashMap<EmployeeId, usize>,
    by_email: HashMap<String, usize>,
}

impl EmployeeDirectory {
    /// Build a directory from already-parsed records.
    ///
    /// Fails if two records share an `employee_id` or an `email`.
    pub fn from_records(records: Vec<EmployeeRecord>) -> Result<Self, DirectoryError> {
        let mut by_id = HashMap::with_capacity(records.len());
        let mut by_email = HashMap::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            if by_id.insert(record.employee_id, index).is_some() {
                return Err(DirectoryError::DuplicateId(record.employee_id));
            }
            if by_email.insert(record.email.clone(), index).is_some() {
                return Err(DirectoryError::DuplicateEmail(record.email.clone()));
            }
        }

        let directory = Self {
            records,
            by_id,
            by_email,
        };

        for record in &directory.records {
            if let Some(manager_id) = record.manager_id {
                if directory.get(manager_id).is_none() {
                    tracing::warn!(
                        employee_id = record.employee_id,
                        manager_id,
                        "employee references a manager that is not in the table"
                    );
                }
            }
        }

        Ok(directory)
    }

    /// Load the employee table from a CSV file with a header row.
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let reader =
            csv::Reader::from_path(path).map_err(|source| DirectoryError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let directory = Self::from_csv(reader)?;
        tracing::info!(
            path = %path.display(),
            employees = directory.len(),
            "employee directory loaded"
        );
        Ok(directory)
    }

    /// Parse CSV content (header row first) from any reader.
    pub fn from_reader(reader: impl Read) -> Result<Self, DirectoryError> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, DirectoryError> {
        let mut records = Vec::new();
        for (index, row) in reader.deserialize::<EmployeeRecord>().enumerate() {
            // Row numbers are 1-based and count data rows only.
            let record = row.map_err(|source| DirectoryError::MalformedRow {
                row: index + 1,
                source,
            })?;
            records.push(record);
        }
        Self::from_records(records)
    }

    /// Look up an employee by id.
    pub fn get(&self, employee_id: EmployeeId) -> Option<&EmployeeRecord> {
        self.by_id.get(&employee_id).map(|&i| &self.records[i])
    }

    /// Look up an employee by exact (case-sensitive) email.
    pub fn find_by_email(&self, email: &str) -> Option<&EmployeeRecord> {
        self.by_email.get(email).map(|&i| &self.records[i])
    }

    /// The role recorded for `email`, or `None` if the email is unknown.
    ///
    /// `None` means the caller's declared role will be used unverified.
    pub fn resolve_role(&self, email: &str) -> Option<&str> {
        self.find_by_email(email).map(|r| r.role.as_str())
    }

    /// True iff `target_id`'s recorded manager is `manager_id`.
    ///
    /// One hop only: a skip-level manager is not a direct manager.
    pub fn is_direct_report(&self, manager_id: EmployeeId, target_id: EmployeeId) -> bool {
        self.get(target_id)
            .and_then(|target| target.manager_id)
            .is_some_and(|m| m == manager_id)
    }

    /// All records, in source order.
    pub fn records(&self) -> &[EmployeeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
