//! Typed configuration from environment variables or a TOML file.
//!
//! Loads once at startup and fails fast on malformed values. Concurrency
//! limits that are out of range are not errors: they resolve to the
//! hardware default when the queue is built.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::limits::Limit;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub concurrency: Limit,
    pub wait_for_first_submission: bool,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: Limit::Default,
            wait_for_first_submission: true,
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

/// Top-level TOML layout.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    queue: QueueSection,
    #[serde(default)]
    telemetry: TelemetrySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueueSection {
    concurrency: Option<Limit>,
    wait_for_first_submission: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TelemetrySection {
    endpoint: Option<String>,
    log_level: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            concurrency: match optional_var("WORKQ_CONCURRENCY") {
                Some(raw) => parse_limit("WORKQ_CONCURRENCY", &raw)?,
                None => defaults.concurrency,
            },
            wait_for_first_submission: match optional_var("WORKQ_WAIT_FOR_FIRST") {
                Some(raw) => parse_bool("WORKQ_WAIT_FOR_FIRST", &raw)?,
                None => defaults.wait_for_first_submission,
            },
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    /// Parse configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("bad config: {e}")))?;
        let defaults = Self::default();

        Ok(Self {
            concurrency: file.queue.concurrency.unwrap_or(defaults.concurrency),
            wait_for_first_submission: file
                .queue
                .wait_for_first_submission
                .unwrap_or(defaults.wait_for_first_submission),
            otel_endpoint: file.telemetry.endpoint,
            log_level: file.telemetry.log_level.unwrap_or(defaults.log_level),
        })
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_limit(name: &str, raw: &str) -> Result<Limit> {
    raw.trim()
        .parse::<i64>()
        .map(Limit::from)
        .map_err(|_| Error::Config(format!("{name} must be an integer, got {raw:?}")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{name} must be a boolean, got {raw:?}"))),
    }
}
