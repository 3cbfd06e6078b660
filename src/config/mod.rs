//! TOML configuration for the Testsigma build step.
//!
//! Values come from a TOML file (path from `--config` or the
//! `TESTSIGMA_STEP_CONFIG` environment variable), with individual fields
//! overridable from the command line. Validation happens once, before any
//! network call, and produces a [`ValidatedConfig`].

pub mod checks;
pub mod messages;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::{debug, info};
use url::Url;

use crate::error::ConfigError;
use crate::poll::PollConfig;
use crate::secret::Secret;

pub use checks::FieldCheck;
pub use messages::StepMessages;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "TESTSIGMA_STEP_CONFIG";

/// The fixed time between two status checks.
pub fn polling_interval() -> Duration {
    Duration::from_secs(StepMessages::POLLING_INTERVAL_MINUTES * 60)
}

/// The five fields a job configures, as entered.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub api_endpoint: String,
    pub api_key: Option<Secret>,
    /// May contain `${NAME}` placeholders bound at build time.
    pub test_plan_id: String,
    /// Kept as text so a bad value is reported by the validator rather than
    /// rejected by the parser.
    #[serde(deserialize_with = "number_or_string")]
    pub max_wait_in_minutes: String,
    pub reports_file_path: String,
}

/// Configuration that passed every check and is ready to run.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub endpoint: Url,
    pub api_key: Secret,
    /// Unresolved; see [`crate::resolver::resolve`].
    pub test_plan_id: String,
    pub max_wait_in_minutes: f64,
    pub poll: PollConfig,
    pub reports_file_path: PathBuf,
}

impl StepConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "loaded step configuration");
        Ok(config)
    }

    /// Load from `path` if given, else from `$TESTSIGMA_STEP_CONFIG`, else
    /// start empty and rely on command-line values.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&env_path));
        }
        debug!("no config file given, using command-line values only");
        Ok(Self::default())
    }

    /// Run every field validator, in form order.
    pub fn checks(&self) -> Vec<(&'static str, FieldCheck)> {
        vec![
            ("api_endpoint", checks::check_api_end_point(&self.api_endpoint)),
            ("api_key", checks::check_api_key(self.api_key.as_ref())),
            ("test_plan_id", checks::check_test_plan_id(&self.test_plan_id)),
            (
                "max_wait_in_minutes",
                checks::check_max_wait_in_minutes(&self.max_wait_in_minutes),
            ),
            (
                "reports_file_path",
                checks::check_reports_file_path(&self.reports_file_path),
            ),
        ]
    }

    /// Validate and bind the polling interval. Any warning or error aborts:
    /// a missing required field cannot produce a usable run.
    pub fn validate(&self, interval: Duration) -> Result<ValidatedConfig, ConfigError> {
        for (field, check) in self.checks() {
            if let Some(message) = check.message() {
                return Err(ConfigError::Invalid {
                    field,
                    message: message.to_string(),
                });
            }
        }

        let endpoint = Url::parse(self.api_endpoint.trim()).map_err(|e| ConfigError::Invalid {
            field: "api_endpoint",
            message: e.to_string(),
        })?;
        let max_wait_in_minutes: f64 =
            self.max_wait_in_minutes
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    field: "max_wait_in_minutes",
                    message: StepMessages::INVALID_NUMBER.to_string(),
                })?;
        let max_wait =
            Duration::try_from_secs_f64(max_wait_in_minutes * 60.0).map_err(|e| {
                ConfigError::Invalid {
                    field: "max_wait_in_minutes",
                    message: e.to_string(),
                }
            })?;

        Ok(ValidatedConfig {
            endpoint,
            api_key: self.api_key.clone().unwrap_or_default(),
            test_plan_id: self.test_plan_id.clone(),
            max_wait_in_minutes,
            poll: PollConfig::new(max_wait, interval)?,
            reports_file_path: PathBuf::from(self.reports_file_path.trim()),
        })
    }
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(v) => v.to_string(),
        Raw::Float(v) => v.to_string(),
        Raw::Text(v) => v,
    })
}
