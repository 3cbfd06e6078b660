//! Scripted in-memory [`ExecutionApi`] for unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use super::{ExecutionApi, ExecutionStatus, RunHandle};
use crate::error::ClientError;

#[derive(Default)]
pub struct ScriptedApi {
    pub run_id: Option<String>,
    /// Returned in order; `Running` once exhausted.
    pub statuses: VecDeque<ExecutionStatus>,
    pub result: String,
    pub report_error: bool,
    pub started_with: Vec<String>,
    pub status_calls: usize,
    pub reports: Vec<PathBuf>,
}

impl ScriptedApi {
    pub fn new(run_id: &str, statuses: &[ExecutionStatus]) -> Self {
        Self {
            run_id: Some(run_id.to_string()),
            statuses: statuses.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn with_result(mut self, result: &str) -> Self {
        self.result = result.to_string();
        self
    }
}

#[async_trait::async_trait]
impl ExecutionApi for ScriptedApi {
    async fn start(&mut self, test_plan_id: &str) -> Option<RunHandle> {
        self.started_with.push(test_plan_id.to_string());
        RunHandle::new(self.run_id.clone().unwrap_or_default())
    }

    async fn status(&mut self, _run: &RunHandle) -> ExecutionStatus {
        self.status_calls += 1;
        self.statuses.pop_front().unwrap_or(ExecutionStatus::Running)
    }

    async fn fetch_report(&mut self, _run: &RunHandle, path: &Path) -> Result<(), ClientError> {
        self.reports.push(path.to_path_buf());
        if self.report_error {
            return Err(ClientError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        Ok(())
    }

    fn last_result(&self) -> &str {
        &self.result
    }
}
