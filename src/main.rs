use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use testsigma_step::config::StepConfig;
use testsigma_step::secret::Secret;
use testsigma_step::step::TEST_PLAN_FIELDS;
use testsigma_step::{BuildContext, BuildLog, Interrupted};

/// Exit code for a build stopped by the host (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

/// The build console already goes to stdout; only its errors are repeated
/// on stderr unless `RUST_LOG` asks for more.
const DEFAULT_LOG_FILTER: &str = "info,build_log=warn";

#[derive(Parser)]
#[command(
    name = "testsigma-step",
    about = "Run a Testsigma test plan as a CI build step",
    version,
    long_about = None
)]
struct Cli {
    /// Emit diagnostic logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the test plan, wait for it, and save the report
    Run {
        #[command(flatten)]
        fields: FieldArgs,

        /// Build identifier shown in the log
        #[arg(long, env = "BUILD_ID", default_value = "local")]
        build_id: String,

        /// Build variable for test plan id placeholders (KEY=VALUE)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },

    /// Validate the configured fields without contacting the service
    Check {
        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Print the step's configuration fields
    Schema {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct FieldArgs {
    /// TOML file with the step configuration [default: $TESTSIGMA_STEP_CONFIG]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Testsigma API base URL
    #[arg(long)]
    api_endpoint: Option<String>,

    /// Testsigma API key
    #[arg(long, env = "TESTSIGMA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Test plan id, may contain ${NAME} placeholders
    #[arg(long)]
    test_plan_id: Option<String>,

    /// Maximum time to wait for the run, in minutes
    #[arg(long)]
    max_wait_in_minutes: Option<String>,

    /// Where to write the JUnit report
    #[arg(long)]
    reports_file_path: Option<PathBuf>,
}

impl FieldArgs {
    fn load(self) -> Result<StepConfig> {
        let mut cfg = StepConfig::load_or_default(self.config.as_deref())
            .context("failed to load step configuration")?;
        if let Some(v) = self.api_endpoint {
            cfg.api_endpoint = v;
        }
        if let Some(v) = self.api_key {
            cfg.api_key = Some(Secret::new(v));
        }
        if let Some(v) = self.test_plan_id {
            cfg.test_plan_id = v;
        }
        if let Some(v) = self.max_wait_in_minutes {
            cfg.max_wait_in_minutes = v;
        }
        if let Some(v) = self.reports_file_path {
            cfg.reports_file_path = v.display().to_string();
        }
        Ok(cfg)
    }
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Run {
            fields,
            build_id,
            vars,
        } => {
            let config = fields.load()?;
            let ctx = vars
                .into_iter()
                .fold(BuildContext::new(build_id).with_env(), |ctx, (k, v)| {
                    ctx.with_var(k, v)
                });

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, stopping build step");
                    on_signal.cancel();
                }
            });

            let log = BuildLog::stdout();
            match testsigma_step::run_step(config, &ctx, &log, &cancel).await {
                Ok(outcome) if outcome.is_success() => Ok(ExitCode::SUCCESS),
                Ok(outcome) => {
                    tracing::info!(%outcome, "build step failed");
                    Ok(ExitCode::FAILURE)
                }
                Err(Interrupted) => {
                    log.error("Build interrupted");
                    Ok(ExitCode::from(EXIT_INTERRUPTED))
                }
            }
        }
        Commands::Check { fields } => {
            let config = fields.load()?;
            let mut failed = false;
            for (field, check) in config.checks() {
                println!("{:<22} | {}", field, check);
                failed |= check.is_error();
            }
            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Schema { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(TEST_PLAN_FIELDS)?);
            } else {
                println!("{:<22} | {:<8} | {:<6} | Description", "Field", "Required", "Secret");
                println!("{:-<22}-|-{:-<8}-|-{:-<6}-|-{:-<40}", "", "", "", "");
                for f in TEST_PLAN_FIELDS {
                    println!(
                        "{:<22} | {:<8} | {:<6} | {}",
                        f.name, f.required, f.secret, f.description
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
