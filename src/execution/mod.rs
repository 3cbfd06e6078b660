//! Remote test plan execution: the calls the step makes and the types
//! they exchange.

pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod wire;

use std::fmt;
use std::path::Path;

use url::Url;

use crate::error::ClientError;
use crate::secret::Secret;

pub use client::ExecutionClient;

/// Where and how to start a run.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub endpoint: Url,
    pub api_key: Secret,
    /// Already resolved and non-empty.
    pub test_plan_id: String,
}

/// Opaque id of one execution of a test plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    run_id: String,
}

impl RunHandle {
    /// Returns `None` for an empty id, which callers treat as a failed start.
    pub fn new(run_id: impl Into<String>) -> Option<Self> {
        let run_id = run_id.into();
        if run_id.trim().is_empty() {
            None
        } else {
            Some(Self { run_id })
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.run_id)
    }
}

/// Remote state of a run as last observed by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Unrecognised status, garbled body, or a failed request.
    Unknown,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// The calls the step makes against the execution service.
///
/// Implementations are bound to one endpoint and API key. `start` and
/// `status` never fail hard: a start failure is `None` and an unreadable
/// status is [`ExecutionStatus::Unknown`].
#[async_trait::async_trait]
pub trait ExecutionApi: Send {
    /// Trigger a run of `test_plan_id`.
    async fn start(&mut self, test_plan_id: &str) -> Option<RunHandle>;

    /// Fetch the current status of `run`.
    async fn status(&mut self, run: &RunHandle) -> ExecutionStatus;

    /// Download the run's report to `path`.
    async fn fetch_report(&mut self, run: &RunHandle, path: &Path) -> Result<(), ClientError>;

    /// Result string carried by the most recent status payload
    /// (`"SUCCESS"`, `"FAILURE"`, ...), or empty if none was seen.
    fn last_result(&self) -> &str;
}
