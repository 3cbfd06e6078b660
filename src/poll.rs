//! Bounded wait for a remote run to reach a terminal status.
//!
//! The loop sleeps one fixed interval, checks status, and repeats until the
//! run completes or fails, or until `ceil(max_wait / interval)` checks have
//! been made. Running out of checks is a local timeout, not a remote state.
//!
//! An `Unknown` status (including a failed status request) is not terminal
//! and uses up one attempt like any other check.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ConfigError, Interrupted};
use crate::execution::{ExecutionApi, ExecutionStatus, RunHandle};
use crate::log::BuildLog;

/// How long to wait, and how often to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_wait: Duration,
    pub interval: Duration,
}

impl PollConfig {
    pub fn new(max_wait: Duration, interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "polling_interval",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(Self { max_wait, interval })
    }

    /// Number of status checks before giving up: `ceil(max_wait / interval)`.
    pub fn attempts(&self) -> u64 {
        let attempts = self.max_wait.as_nanos().div_ceil(self.interval.as_nanos());
        u64::try_from(attempts).unwrap_or(u64::MAX)
    }
}

/// How the wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed,
    TimedOut,
}

impl PollOutcome {
    pub fn completed(self) -> bool {
        self == PollOutcome::Completed
    }
}

/// Poll `run` until it is terminal or the attempt budget is spent.
///
/// Cancelling `cancel` aborts the current sleep or request at once and
/// returns [`Interrupted`].
pub async fn wait_for_completion<A: ExecutionApi + ?Sized>(
    api: &mut A,
    run: &RunHandle,
    config: &PollConfig,
    cancel: &CancellationToken,
    log: &BuildLog,
) -> Result<PollOutcome, Interrupted> {
    let attempts = config.attempts();
    info!(run_id = %run, attempts, interval_secs = config.interval.as_secs(), "waiting for execution");

    for attempt in 1..=attempts {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Interrupted),
            _ = tokio::time::sleep(config.interval) => {}
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Interrupted),
            status = api.status(run) => status,
        };
        debug!(run_id = %run, attempt, %status, "status check");
        log.println(format!(
            "Status check {} of {}: {}",
            attempt, attempts, status
        ));

        if status.is_terminal() {
            return Ok(if status == ExecutionStatus::Completed {
                PollOutcome::Completed
            } else {
                PollOutcome::Failed
            });
        }
    }

    if cancel.is_cancelled() {
        return Err(Interrupted);
    }
    Ok(PollOutcome::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::fake::ScriptedApi;
    use ExecutionStatus::*;

    const FIVE_MIN: Duration = Duration::from_secs(300);

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    fn run() -> RunHandle {
        RunHandle::new("r-1").unwrap()
    }

    #[test]
    fn attempts_round_up() {
        let cfg = |wait| PollConfig::new(wait, FIVE_MIN).unwrap().attempts();
        assert_eq!(cfg(minutes(0)), 0);
        assert_eq!(cfg(minutes(1)), 1);
        assert_eq!(cfg(minutes(5)), 1);
        assert_eq!(cfg(minutes(10)), 2);
        assert_eq!(cfg(minutes(11)), 3);
        assert_eq!(cfg(Duration::from_secs_f64(7.5 * 60.0)), 2);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(PollConfig::new(minutes(10), Duration::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_wait_times_out_without_checking() {
        let mut api = ScriptedApi::new("r-1", &[Completed]);
        let (log, _) = BuildLog::memory();
        let cfg = PollConfig::new(Duration::ZERO, FIVE_MIN).unwrap();
        let outcome = wait_for_completion(&mut api, &run(), &cfg, &CancellationToken::new(), &log)
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(api.status_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_second_attempt_when_completed() {
        let mut api = ScriptedApi::new("r-1", &[Running, Completed]);
        let (log, captured) = BuildLog::memory();
        let cfg = PollConfig::new(minutes(10), FIVE_MIN).unwrap();
        let started = tokio::time::Instant::now();
        let outcome = wait_for_completion(&mut api, &run(), &cfg, &CancellationToken::new(), &log)
            .await
            .unwrap();
        assert!(outcome.completed());
        assert_eq!(api.status_calls, 2);
        assert!(started.elapsed() >= minutes(10));
        assert!(captured.contains("Status check 2 of 2: completed"));
    }

    #[tokio::test(start_paused = true)]
    async fn first_check_completed_is_one_call() {
        let mut api = ScriptedApi::new("r-1", &[Completed]);
        let (log, _) = BuildLog::memory();
        let cfg = PollConfig::new(minutes(60), FIVE_MIN).unwrap();
        let outcome = wait_for_completion(&mut api, &run(), &cfg, &CancellationToken::new(), &log)
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::Completed);
        assert_eq!(api.status_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_stops_early() {
        let mut api = ScriptedApi::new("r-1", &[Pending, Failed, Completed]);
        let (log, _) = BuildLog::memory();
        let cfg = PollConfig::new(minutes(60), FIVE_MIN).unwrap();
        let outcome = wait_for_completion(&mut api, &run(), &cfg, &CancellationToken::new(), &log)
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::Failed);
        assert!(!outcome.completed());
        assert_eq!(api.status_calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn never_checks_more_than_budget() {
        for wait_minutes in [1, 5, 9, 10, 23] {
            let mut api = ScriptedApi::new("r-1", &[]);
            let (log, _) = BuildLog::memory();
            let cfg = PollConfig::new(minutes(wait_minutes), FIVE_MIN).unwrap();
            let outcome =
                wait_for_completion(&mut api, &run(), &cfg, &CancellationToken::new(), &log)
                    .await
                    .unwrap();
            assert_eq!(outcome, PollOutcome::TimedOut);
            assert_eq!(api.status_calls as u64, wait_minutes.div_ceil(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_keeps_polling() {
        let mut api = ScriptedApi::new("r-1", &[Unknown, Unknown, Unknown]);
        let (log, _) = BuildLog::memory();
        let cfg = PollConfig::new(minutes(15), FIVE_MIN).unwrap();
        let outcome = wait_for_completion(&mut api, &run(), &cfg, &CancellationToken::new(), &log)
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(api.status_calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_sleep_interrupts() {
        let mut api = ScriptedApi::new("r-1", &[]);
        let (log, _) = BuildLog::memory();
        let cfg = PollConfig::new(minutes(60), FIVE_MIN).unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(minutes(7)).await;
            trigger.cancel();
        });

        let result = wait_for_completion(&mut api, &run(), &cfg, &cancel, &log).await;
        assert_eq!(result, Err(Interrupted));
        assert_eq!(api.status_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_makes_no_calls() {
        let mut api = ScriptedApi::new("r-1", &[Completed]);
        let (log, _) = BuildLog::memory();
        let cfg = PollConfig::new(minutes(10), FIVE_MIN).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = wait_for_completion(&mut api, &run(), &cfg, &cancel, &log).await;
        assert_eq!(result, Err(Interrupted));
        assert_eq!(api.status_calls, 0);
    }
}
