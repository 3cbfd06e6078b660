//! Error types shared across the build step.

use std::path::PathBuf;

use thiserror::Error;

/// Problems with the step's inbound configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// A test plan identifier could not be bound against the build context.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("placeholder ${{{name}}} has no value in the build context")]
    Unbound { name: String },

    #[error("test plan id resolved to an empty string")]
    Empty,
}

/// Failures talking to the remote execution service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response body from {url}: {reason}")]
    Body { url: String, reason: String },

    #[error("failed to write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid endpoint {endpoint}: {reason}")]
    Endpoint { endpoint: String, reason: String },
}

/// The host asked the build to stop while the step was waiting.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("build interrupted")]
pub struct Interrupted;
