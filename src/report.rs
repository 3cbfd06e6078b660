//! Mapping of the remote result onto the build's pass/fail state.

use std::fmt;

/// The remote result string that counts as a pass.
pub const SUCCESS_RESULT: &str = "SUCCESS";

/// `true` only for a completed run whose result is `SUCCESS` (any case).
pub fn map_outcome(completed: bool, last_result: &str) -> bool {
    completed && last_result.eq_ignore_ascii_case(SUCCESS_RESULT)
}

/// Why a step ended the way it did. The host only sees
/// [`StepOutcome::is_success`]; the variants keep failure causes apart for
/// logs and exit codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Passed,
    /// The run completed with a non-success result.
    TestsFailed { result: String },
    /// The wait budget ran out before a terminal status.
    NotCompleted,
    /// The remote service reported the run as failed.
    RemoteFailed,
    StartFailed,
    ReportFailed { reason: String },
    ConfigInvalid { reason: String },
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Passed)
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Passed => write!(f, "passed"),
            StepOutcome::TestsFailed { result } if result.is_empty() => {
                write!(f, "failed (no result reported)")
            }
            StepOutcome::TestsFailed { result } => write!(f, "failed (result: {})", result),
            StepOutcome::NotCompleted => write!(f, "not completed within the wait time"),
            StepOutcome::RemoteFailed => write!(f, "execution failed on the remote service"),
            StepOutcome::StartFailed => write!(f, "execution could not be started"),
            StepOutcome::ReportFailed { reason } => write!(f, "report not saved: {}", reason),
            StepOutcome::ConfigInvalid { reason } => write!(f, "invalid configuration: {}", reason),
        }
    }
}
