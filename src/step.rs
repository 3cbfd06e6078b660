//! The Testsigma build step: start a test plan, wait for it, save its
//! report, and turn the result into pass/fail.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{self, StepConfig, StepMessages};
use crate::context::BuildContext;
use crate::error::Interrupted;
use crate::execution::{ExecutionApi, ExecutionClient, ExecutionRequest};
use crate::log::BuildLog;
use crate::poll::{self, PollConfig, PollOutcome};
use crate::report::{map_outcome, StepOutcome};
use crate::resolver;

/// One configurable field of a build step, as shown to the host.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub secret: bool,
    pub description: &'static str,
}

/// A unit of work a CI host can register and run.
#[async_trait::async_trait]
pub trait BuildStep: Send {
    fn display_name(&self) -> &'static str;

    /// Fields the step reads from the job configuration.
    fn schema(&self) -> &'static [FieldSpec];

    /// Run the step. Every failure is folded into the returned outcome;
    /// only host cancellation is an error.
    async fn perform(
        &mut self,
        ctx: &BuildContext,
        log: &BuildLog,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, Interrupted>;
}

pub const TEST_PLAN_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "api_endpoint",
        required: true,
        secret: false,
        description: "Base URL of the Testsigma API, e.g. https://app.testsigma.com/api/v1",
    },
    FieldSpec {
        name: "api_key",
        required: true,
        secret: true,
        description: "Testsigma API key",
    },
    FieldSpec {
        name: "test_plan_id",
        required: true,
        secret: false,
        description: "Test plan to run; may reference build variables as ${NAME}",
    },
    FieldSpec {
        name: "max_wait_in_minutes",
        required: true,
        secret: false,
        description: "How long to wait for the run to finish, in minutes (>= 0)",
    },
    FieldSpec {
        name: "reports_file_path",
        required: true,
        secret: false,
        description: "Where to save the JUnit report",
    },
];

/// Build step running a Testsigma test plan.
pub struct TestPlanStep {
    config: StepConfig,
    interval: Duration,
}

impl TestPlanStep {
    pub fn new(config: StepConfig) -> Self {
        Self {
            config,
            interval: config::polling_interval(),
        }
    }

    /// Override the polling interval. Used to exercise the step against a
    /// local server without multi-minute waits.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[async_trait::async_trait]
impl BuildStep for TestPlanStep {
    fn display_name(&self) -> &'static str {
        StepMessages::DISPLAY_NAME
    }

    fn schema(&self) -> &'static [FieldSpec] {
        TEST_PLAN_FIELDS
    }

    async fn perform(
        &mut self,
        ctx: &BuildContext,
        log: &BuildLog,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, Interrupted> {
        log.println(format!("Build ID:{}", ctx.build_id()));
        log.println(StepMessages::START_BANNER);

        let validated = match self.config.validate(self.interval) {
            Ok(v) => v,
            Err(e) => {
                log.error(e.to_string());
                return Ok(StepOutcome::ConfigInvalid {
                    reason: e.to_string(),
                });
            }
        };

        log.println(format!("Testsigma API Endpoint:{}", validated.endpoint));
        log.println(format!("Provided TestPlanID:{}", validated.test_plan_id));
        log.println(format!(
            "Max wait time in minutes:{}",
            validated.max_wait_in_minutes
        ));
        log.println(format!(
            "Polling Interval:{} minutes",
            validated.poll.interval.as_secs_f64() / 60.0
        ));
        log.println(format!(
            "Report file path:{}",
            validated.reports_file_path.display()
        ));

        let test_plan_id = match resolver::resolve(&validated.test_plan_id, ctx) {
            Ok(id) => id,
            Err(e) => {
                log.error(format!("Unable to resolve test plan id: {}", e));
                return Ok(StepOutcome::ConfigInvalid {
                    reason: e.to_string(),
                });
            }
        };
        log.println(format!("Test plan Id:{}", test_plan_id));

        let request = ExecutionRequest {
            endpoint: validated.endpoint,
            api_key: validated.api_key,
            test_plan_id,
        };
        let mut client = match ExecutionClient::for_request(&request, log.clone()) {
            Ok(c) => c,
            Err(e) => {
                log.error(e.to_string());
                return Ok(StepOutcome::ConfigInvalid {
                    reason: e.to_string(),
                });
            }
        };

        run_test_plan(
            &mut client,
            &request.test_plan_id,
            &validated.poll,
            &validated.reports_file_path,
            log,
            cancel,
        )
        .await
    }
}

/// Start `test_plan_id`, wait for it, and fetch its report.
///
/// Independent of any host: everything it needs is passed in.
pub async fn run_test_plan<A: ExecutionApi + ?Sized>(
    api: &mut A,
    test_plan_id: &str,
    poll_config: &PollConfig,
    reports_file_path: &Path,
    log: &BuildLog,
    cancel: &CancellationToken,
) -> Result<StepOutcome, Interrupted> {
    let started = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Interrupted),
        run = api.start(test_plan_id) => run,
    };
    let Some(run) = started else {
        log.println(StepMessages::UNABLE_TO_START);
        return Ok(StepOutcome::StartFailed);
    };
    info!(run_id = %run, %test_plan_id, "test plan execution started");

    let outcome = match poll::wait_for_completion(api, &run, poll_config, cancel, log).await? {
        PollOutcome::Completed => {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Interrupted),
                fetched = api.fetch_report(&run, reports_file_path) => fetched,
            };
            match fetched {
                Err(e) => {
                    warn!(run_id = %run, error = %e, "report download failed");
                    log.error(format!("Unable to save test report: {}", e));
                    StepOutcome::ReportFailed {
                        reason: e.to_string(),
                    }
                }
                Ok(()) if map_outcome(true, api.last_result()) => StepOutcome::Passed,
                Ok(()) => StepOutcome::TestsFailed {
                    result: api.last_result().to_string(),
                },
            }
        }
        PollOutcome::Failed => {
            log.println("Test Plan execution failed on the remote service.");
            StepOutcome::RemoteFailed
        }
        PollOutcome::TimedOut => {
            log.println(StepMessages::NOT_COMPLETED);
            StepOutcome::NotCompleted
        }
    };

    log.println(StepMessages::END_BANNER);
    log.println(format!("Result: {}", outcome));
    Ok(outcome)
}
