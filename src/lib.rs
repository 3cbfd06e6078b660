//! testsigma-step -- CI build step for Testsigma test plans.
//!
//! Triggers a remote test plan run over HTTP, polls it at a fixed interval
//! until it finishes or the wait budget runs out, saves the JUnit report,
//! and maps the remote result to a pass/fail build state.

pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod log;
pub mod poll;
pub mod report;
pub mod resolver;
pub mod secret;
pub mod step;

pub use context::BuildContext;
pub use error::Interrupted;
pub use log::BuildLog;
pub use report::StepOutcome;
pub use step::{BuildStep, TestPlanStep};

use tokio_util::sync::CancellationToken;

/// Run the Testsigma step once with `config`, logging to `log`.
pub async fn run_step(
    config: config::StepConfig,
    ctx: &BuildContext,
    log: &BuildLog,
    cancel: &CancellationToken,
) -> Result<StepOutcome, Interrupted> {
    let mut step = TestPlanStep::new(config);
    tracing::info!(step = step.display_name(), build_id = ctx.build_id(), "running build step");
    step.perform(ctx, log, cancel).await
}
