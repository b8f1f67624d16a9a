// role.rs - Role classes used by the rules.
//
// Role names are compared as exact strings. The manager class is a literal
// suffix test: "Product Manager" and "Account Manager" are manager-class
// too, whether or not they supervise anyone.

/// Roles with broad access to HR-governed resources.
pub const HR_CLASS: &[&str] = &["HR", "HR Manager", "HR Director", "Admin"];

/// Roles with unconditional access to financial reports.
pub const FINANCE_CLASS: &[&str] = &["Finance", "CFO", "CEO"];

/// Role allowed quarterly financial reports only.
pub const EXECUTIVE: &str = "Executive";

const MANAGER_SUFFIX: &str = "Manager";

pub fn is_hr_class(role: &str) -> bool {
    HR_CLASS.contains(&role)
}

pub fn is_finance_class(role: &str) -> bool {
    FINANCE_CLASS.contains(&role)
}

/// Any role whose name ends in "Manager".
pub fn is_manager_class(role: &str) -> bool {
    role.ends_with(MANAGER_SUFFIX)
}
