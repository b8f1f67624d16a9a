// config.rs - Concierge configuration.
//
// `for_project()` lays everything out under the project root:
//
//   <root>/data/employees.csv   employee table (loaded once at startup)
//   <root>/logs/audit.jsonl     append-only audit log
//
// An optional `<root>/concierge.toml` overrides any of the defaults.
// Relative paths in the file are resolved against the project root.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::citation::DEFAULT_MAX_IN_FLIGHT;
use crate::error::GatewayError;

/// Default bound on a single citation lookup.
pub const DEFAULT_CITATION_TIMEOUT_MS: u64 = 1500;

/// Configuration for a [`Concierge`](crate::Concierge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConciergeConfig {
    /// CSV file holding the employee table.
    pub employees_csv: PathBuf,

    /// Path to the append-only audit log.
    pub audit_log: PathBuf,

    /// Policy corpus name cited in every decision.
    pub policy_ref: String,

    /// Upper bound on one citation lookup, in milliseconds.
    pub citation_timeout_ms: u64,

    /// Cap on citation lookups running at once, abandoned ones included.
    pub citation_max_in_flight: usize,

    /// Whether decisions are enriched with citations at all.
    pub citations_enabled: bool,
}

/// On-disk form: every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    employees_csv: Option<PathBuf>,
    audit_log: Option<PathBuf>,
    policy_ref: Option<String>,
    citation_timeout_ms: Option<u64>,
    citation_max_in_flight: Option<usize>,
    citations_enabled: Option<bool>,
}

impl ConciergeConfig {
    /// Name of the optional config file in the project root.
    pub const FILE_NAME: &'static str = "concierge.toml";

    /// Defaults for a project rooted at `project_root`.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref();
        Self {
            employees_csv: root.join("data").join("employees.csv"),
            audit_log: root.join("logs").join("audit.jsonl"),
            policy_ref: concierge_policy::DEFAULT_POLICY_REF.to_string(),
            citation_timeout_ms: DEFAULT_CITATION_TIMEOUT_MS,
            citation_max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            citations_enabled: true,
        }
    }

    /// Load `<root>/concierge.toml` if present, otherwise use the defaults.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let root = project_root.as_ref();
        let path = root.join(Self::FILE_NAME);
        if path.exists() {
            Self::from_file(root, &path)
        } else {
            Ok(Self::for_project(root))
        }
    }

    /// Load overrides from a specific file on top of the project defaults.
    pub fn from_file(
        project_root: impl AsRef<Path>,
        path: impl AsRef<Path>,
    ) -> Result<Self, GatewayError> {
        let root = project_root.as_ref();
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| GatewayError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile =
            toml::from_str(&text).map_err(|source| GatewayError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::for_project(root);
        if let Some(p) = file.employees_csv {
            config.employees_csv = root.join(p);
        }
        if let Some(p) = file.audit_log {
            config.audit_log = root.join(p);
        }
        if let Some(r) = file.policy_ref {
            config.policy_ref = r;
        }
        if let Some(ms) = file.citation_timeout_ms {
            config.citation_timeout_ms = ms;
        }
        if let Some(max) = file.citation_max_in_flight {
            config.citation_max_in_flight = max;
        }
        if let Some(enabled) = file.citations_enabled {
            config.citations_enabled = enabled;
        }

        tracing::debug!(path = %path.display(), "loaded concierge config");
        Ok(config)
    }

    pub fn citation_timeout(&self) -> Duration {
        Duration::from_millis(self.citation_timeout_ms)
    }
}
