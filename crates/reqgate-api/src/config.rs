//! # Server Configuration
//!
//! Read from the environment at startup. Every variable is optional:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `PORT` | `8080` | Listen port |
//! | `REQGATE_LOG_FORMAT` | `pretty` | `pretty` or `json` |
//! | `REQGATE_BODY_LIMIT` | `1048576` | Maximum request body size in bytes |
//! | `REQGATE_COERCE_TYPES` | `true` | Default engine type coercion |
//! | `REQGATE_REMOVE_ADDITIONAL` | `true` | Default engine additional-property removal |
//! | `REQGATE_ALL_ERRORS` | `false` | Report every violation, not just the first |
//!
//! A variable that is set but unparsable is a [`ConfigError`], never a
//! silent fallback to the default.

use std::str::FromStr;

use reqgate_schema::EngineOptions;
use thiserror::Error;

/// Default request body limit: 1 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// Error building [`AppConfig`] from the environment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable holds a value that does not parse.
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Log output format.
    pub log_format: LogFormat,
    /// Maximum accepted request body, in bytes.
    pub body_limit: usize,
    /// Options for the default schema engine.
    pub engine: EngineOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            log_format: LogFormat::default(),
            body_limit: DEFAULT_BODY_LIMIT,
            engine: EngineOptions::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for the first variable that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for the first variable that does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            port: parse_var(&lookup, "PORT", defaults.port, |v| {
                v.parse::<u16>().map_err(|e| e.to_string())
            })?,
            log_format: parse_var(&lookup, "REQGATE_LOG_FORMAT", defaults.log_format, |v| {
                v.parse::<LogFormat>()
            })?,
            body_limit: parse_var(&lookup, "REQGATE_BODY_LIMIT", defaults.body_limit, |v| {
                v.parse::<usize>().map_err(|e| e.to_string())
            })?,
            engine: EngineOptions {
                coerce_types: parse_var(
                    &lookup,
                    "REQGATE_COERCE_TYPES",
                    defaults.engine.coerce_types,
                    parse_bool,
                )?,
                remove_additional: parse_var(
                    &lookup,
                    "REQGATE_REMOVE_ADDITIONAL",
                    defaults.engine.remove_additional,
                    parse_bool,
                )?,
                all_errors: parse_var(
                    &lookup,
                    "REQGATE_ALL_ERRORS",
                    defaults.engine.all_errors,
                    parse_bool,
                )?,
            },
        })
    }
}

fn parse_var<T, F, P>(lookup: &F, var: &'static str, default: T, parse: P) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Result<T, String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => parse(value.trim()).map_err(|reason| ConfigError::Invalid {
            var,
            value,
            reason,
        }),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}
