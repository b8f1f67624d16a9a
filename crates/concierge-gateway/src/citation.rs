// citation.rs - Best-effort policy citations for decisions.
//
// A citation is decoration. The retriever is an external collaborator that
// may be slow, down, or return garbage; none of that may change a decision
// or fail a request. `CitationEnricher` therefore runs each query on its own
// thread and waits for it with a hard timeout. A late answer is discarded.
//
// Timed-out workers keep running until the retriever returns, so the number
// of workers alive at once is capped. At the cap, new lookups are skipped.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use concierge_policy::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a retriever returns for a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalResponse {
    pub response: String,
}

/// A retriever failure. Always swallowed by the enricher.
#[derive(Debug, Error)]
#[error("policy retrieval failed: {0}")]
pub struct RetrievalError(pub String);

/// The external semantic-retrieval collaborator.
pub trait PolicyRetriever: Send + Sync {
    fn query(&self, text: &str) -> Result<RetrievalResponse, RetrievalError>;
}

/// The question asked for every decision.
pub fn citation_query(resource: &Resource, role: &str) -> String {
    format!(
        "Which policy governs {} access for role {}? Cite section.",
        resource, role
    )
}

/// Default cap on citation workers alive at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Runs citation queries against a retriever with a bounded wait.
///
/// Clones share the same worker count.
#[derive(Clone)]
pub struct CitationEnricher {
    retriever: Arc<dyn PolicyRetriever>,
    timeout: Duration,
    max_in_flight: usize,
    in_flight: Arc<AtomicUsize>,
}

impl fmt::Debug for CitationEnricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CitationEnricher")
            .field("timeout", &self.timeout)
            .field("max_in_flight", &self.max_in_flight)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// One slot of the worker count, released on drop (including on panic).
struct WorkerSlot(Arc<AtomicUsize>);

impl WorkerSlot {
    fn acquire(count: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()
            .map(|_| Self(Arc::clone(count)))
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A query in flight. Dropping it abandons the answer.
pub struct PendingCitation {
    rx: mpsc::Receiver<Result<RetrievalResponse, RetrievalError>>,
    timeout: Duration,
}

impl CitationEnricher {
    pub fn new(retriever: Arc<dyn PolicyRetriever>, timeout: Duration) -> Self {
        Self {
            retriever,
            timeout,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Cap the number of workers alive at once. Zero disables lookups.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Workers currently running, including abandoned ones.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start the query for `resource`/`role` in the background.
    ///
    /// Returns `None` if the worker cap is reached or no thread could be
    /// spawned.
    pub fn start(&self, resource: &Resource, role: &str) -> Option<PendingCitation> {
        let Some(slot) = WorkerSlot::acquire(&self.in_flight, self.max_in_flight) else {
            tracing::debug!(
                max_in_flight = self.max_in_flight,
                "citation workers saturated, skipping lookup"
            );
            return None;
        };

        let query = citation_query(resource, role);
        let retriever = Arc::clone(&self.retriever);
        let (tx, rx) = mpsc::sync_channel(1);

        // On spawn failure the closure, and the slot with it, is dropped.
        let spawned = thread::Builder::new()
            .name("citation".to_string())
            .spawn(move || {
                let _slot = slot;
                // The receiver may be gone after a timeout; nothing to do then.
                let _ = tx.send(retriever.query(&query));
            });

        match spawned {
            Ok(_) => Some(PendingCitation {
                rx,
                timeout: self.timeout,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "could not start citation lookup");
                None
            }
        }
    }

    /// Query and wait, bounded by the timeout.
    pub fn cite(&self, resource: &Resource, role: &str) -> Option<String> {
        self.start(resource, role).and_then(PendingCitation::wait)
    }
}

impl PendingCitation {
    /// Wait for the answer. Errors, panics in the retriever, blank answers
    /// and timeouts all yield `None`.
    pub fn wait(self) -> Option<String> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(Ok(answer)) => {
                let text = answer.response.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "citation lookup failed");
                None
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::debug!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "citation lookup timed out"
                );
                None
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::debug!("citation lookup aborted");
                None
            }
        }
    }
}

/// One entry of the policy handbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub title: String,
    pub section: String,
    pub text: String,
    /// Lowercase keywords the document is found by.
    pub tags: Vec<String>,
}

/// An in-process retriever over a fixed set of policy documents.
///
/// Scores each document by how many of its tags occur in the query and
/// answers with the best one as `"{title} ({section}): {text}"`. No match
/// yields an empty response.
#[derive(Debug, Clone)]
pub struct CatalogRetriever {
    documents: Vec<PolicyDocument>,
}

impl CatalogRetriever {
    pub fn new(documents: Vec<PolicyDocument>) -> Self {
        Self { documents }
    }

    /// The handbook sections governing the concierge's resources.
    pub fn handbook() -> Self {
        let doc = |title: &str, section: &str, text: &str, tags: &[&str]| PolicyDocument {
            title: title.to_string(),
            section: section.to_string(),
            text: text.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        Self::new(vec![
            doc(
                "Company Directory",
                "GEN-1.1",
                "The company directory (name, email, department, role, manager, city) is accessible to all employees.",
                &["directory"],
            ),
            doc(
                "Employee Salary Access",
                "HR-1.1",
                "Only HR and Admin roles may access employee salary information. Managers may view salary bands for their direct reports only during performance review cycles. All access requires valid business justification.",
                &["salary", "compensation"],
            ),
            doc(
                "Performance Review Access",
                "HR-1.2",
                "HR may access all performance reviews. Managers may access reviews for direct reports. Employees may access their own reviews. Cross-team access requires HR approval.",
                &["performance_summary", "performance", "review"],
            ),
            doc(
                "PII Export Restrictions",
                "HR-2.1",
                "Exporting personally identifiable information requires explicit manager approval, documented business need, and automatic audit logging with requestor identity, purpose, and export timestamp.",
                &["pii", "export"],
            ),
            doc(
                "Financial Report Access",
                "FIN-1.1",
                "Finance, the CFO and the CEO may access financial reports. Executives may access quarterly summaries. All other access requires CFO approval.",
                &["financial_report", "financial", "finance"],
            ),
        ])
    }
}

impl PolicyRetriever for CatalogRetriever {
    fn query(&self, text: &str) -> Result<RetrievalResponse, RetrievalError> {
        let query = text.to_lowercase();
        let best = self
            .documents
            .iter()
            .map(|doc| {
                let score = doc
                    .tags
                    .iter()
                    .filter(|tag| query.contains(tag.as_str()))
                    .count();
                (score, doc)
            })
            .filter(|(score, _)| *score > 0)
            // First document wins ties.
            .fold(None::<(usize, &PolicyDocument)>, |best, candidate| match best {
                Some(b) if b.0 >= candidate.0 => Some(b),
                _ => Some(candidate),
            });

        Ok(RetrievalResponse {
            response: best
                .map(|(_, doc)| format!("{} ({}): {}", doc.title, doc.section, doc.text))
                .unwrap_or_default(),
        })
    }
}
