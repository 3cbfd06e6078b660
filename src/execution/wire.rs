//! JSON bodies exchanged with the Testsigma execution API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ExecutionStatus, RunHandle};

/// Body of the start call. Numeric plan ids are sent as numbers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub execution_id: Value,
}

impl StartRequest {
    pub fn new(test_plan_id: &str) -> Self {
        let execution_id = match test_plan_id.parse::<u64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::from(test_plan_id),
        };
        Self { execution_id }
    }
}

#[derive(Debug, Deserialize)]
pub struct StartResponse {
    #[serde(default)]
    pub id: Option<Value>,
}

impl StartResponse {
    pub fn run_handle(&self) -> Option<RunHandle> {
        match self.id.as_ref()? {
            Value::Number(n) => RunHandle::new(n.to_string()),
            Value::String(s) => RunHandle::new(s.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

/// Map a remote status name onto [`ExecutionStatus`]. Matching ignores case
/// and an optional `STATUS_` prefix.
pub fn parse_status(raw: &str) -> ExecutionStatus {
    let upper = raw.trim().to_ascii_uppercase();
    let name = upper.strip_prefix("STATUS_").unwrap_or(&upper);
    match name {
        "CREATED" | "QUEUED" | "PENDING" => ExecutionStatus::Pending,
        "IN_PROGRESS" | "RUNNING" | "STARTED" => ExecutionStatus::Running,
        "COMPLETED" => ExecutionStatus::Completed,
        "FAILED" | "ABORTED" | "STOPPED" | "CANCELLED" => ExecutionStatus::Failed,
        _ => ExecutionStatus::Unknown,
    }
}
