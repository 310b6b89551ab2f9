//! Logging via tracing-subscriber, always to stderr so stdout carries only
//! the device ID.
//!
//! The filter is picked by [`resolve_level`], first match wins:
//!   1. `-v` (debug) or `-vv` (trace)
//!   2. `NODEGEN_LOG_LEVEL`, a plain level name
//!   3. `RUST_LOG`, any `EnvFilter` directive
//!   4. `info`
//!
//! Unusable values at steps 2 and 3 are skipped and reported back so the
//! caller can warn once the subscriber is up.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

pub const LEVEL_ENV: &str = "NODEGEN_LOG_LEVEL";
pub const DEFAULT_LEVEL: &str = "info";

/// Where the effective filter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSource {
    Verbosity,
    LevelEnv,
    RustLog,
    Default,
}

/// Outcome of [`resolve_level`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub directive: String,
    pub source: LevelSource,
    /// Environment values that were set but could not be used, as `(var, value)`.
    pub ignored: Vec<(&'static str, String)>,
}

/// Pick the filter directive from the `-v` count and the two env values.
pub fn resolve_level(verbosity: u8, level_env: Option<&str>, rust_log: Option<&str>) -> LogSettings {
    let mut ignored = Vec::new();

    let forced = match verbosity {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };
    if let Some(level) = forced {
        return LogSettings {
            directive: level.to_string(),
            source: LevelSource::Verbosity,
            ignored,
        };
    }

    if let Some(level) = level_env.map(str::trim).filter(|l| !l.is_empty()) {
        match parse_level(level) {
            Ok(filter) => {
                return LogSettings {
                    directive: filter.to_string().to_lowercase(),
                    source: LevelSource::LevelEnv,
                    ignored,
                };
            }
            Err(_) => ignored.push((LEVEL_ENV, level.to_string())),
        }
    }

    if let Some(directive) = rust_log.map(str::trim).filter(|d| !d.is_empty()) {
        if EnvFilter::try_new(directive).is_ok() {
            return LogSettings {
                directive: directive.to_string(),
                source: LevelSource::RustLog,
                ignored,
            };
        }
        ignored.push(("RUST_LOG", directive.to_string()));
    }

    LogSettings {
        directive: DEFAULT_LEVEL.to_string(),
        source: LevelSource::Default,
        ignored,
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init(settings: &LogSettings) -> Result<(), AppError> {
    let filter = EnvFilter::try_new(&settings.directive)
        .map_err(|e| AppError::Logger(format!("invalid log filter '{}': {e}", settings.directive)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

/// A single level name such as `warn` or `DEBUG`.
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))
}
