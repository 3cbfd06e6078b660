//! Per-field validators for the step's job configuration.
//!
//! These are what a host calls while the job is being edited. `Warning`
//! means "missing"; `Error` means the value can never work.

use std::fmt;
use std::time::Duration;

use url::Url;

use super::messages::StepMessages;
use crate::secret::Secret;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldCheck {
    Ok,
    Warning(&'static str),
    Error(&'static str),
}

impl FieldCheck {
    pub fn is_error(&self) -> bool {
        matches!(self, FieldCheck::Error(_))
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            FieldCheck::Ok => None,
            FieldCheck::Warning(m) | FieldCheck::Error(m) => Some(m),
        }
    }
}

impl fmt::Display for FieldCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldCheck::Ok => write!(f, "ok"),
            FieldCheck::Warning(m) => write!(f, "warning: {}", m),
            FieldCheck::Error(m) => write!(f, "error: {}", m),
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn check_test_plan_id(test_plan_id: &str) -> FieldCheck {
    if is_blank(test_plan_id) {
        return FieldCheck::Warning(StepMessages::INVALID_TEST_PLAN_ID);
    }
    FieldCheck::Ok
}

pub fn check_api_end_point(api_end_point: &str) -> FieldCheck {
    if is_blank(api_end_point) {
        return FieldCheck::Warning(StepMessages::INVALID_API_END_POINT);
    }
    match Url::parse(api_end_point.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => FieldCheck::Ok,
        _ => FieldCheck::Error(StepMessages::MALFORMED_API_END_POINT),
    }
}

pub fn check_api_key(api_key: Option<&Secret>) -> FieldCheck {
    match api_key {
        Some(key) if !key.is_empty() => FieldCheck::Ok,
        _ => FieldCheck::Warning(StepMessages::INVALID_API_KEY),
    }
}

pub fn check_max_wait_in_minutes(max_wait_in_minutes: &str) -> FieldCheck {
    if is_blank(max_wait_in_minutes) {
        return FieldCheck::Warning(StepMessages::INVALID_NUMBER);
    }
    match max_wait_in_minutes.trim().parse::<f64>() {
        Ok(v) if !v.is_finite() => FieldCheck::Error(StepMessages::INVALID_NUMBER),
        Ok(v) if v < 0.0 => FieldCheck::Error(StepMessages::ENTER_GREATER_THAN_ZERO),
        Ok(v) if Duration::try_from_secs_f64(v * 60.0).is_err() => {
            FieldCheck::Error(StepMessages::MAX_WAIT_TOO_LARGE)
        }
        Ok(_) => FieldCheck::Ok,
        Err(_) => FieldCheck::Error(StepMessages::INVALID_NUMBER),
    }
}

pub fn check_reports_file_path(reports_file_path: &str) -> FieldCheck {
    if is_blank(reports_file_path) {
        return FieldCheck::Warning(StepMessages::INVALID_REPORT_FILE_NAME);
    }
    FieldCheck::Ok
}
