// src/logging.rs

//! Logging setup for `launchdag` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `LAUNCHDAG_LOG` environment variable; accepts a plain level ("debug")
//!    or a full filter directive ("launchdag::dag=trace,info")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout stays free for the dry-run plan
//! and the final summary.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "LAUNCHDAG_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> Result<EnvFilter> {
    if let Some(lvl) = cli_level {
        return Ok(EnvFilter::new(level_directive(lvl)));
    }
    match env_value.map(str::trim) {
        Some(value) if !value.is_empty() => EnvFilter::try_new(value)
            .with_context(|| format!("invalid {LOG_ENV_VAR} value: {value}")),
        _ => Ok(EnvFilter::new("info")),
    }
}

fn level_directive(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn cli_level_wins_over_env() {
        let filter = build_filter(Some(LogLevel::Trace), Some("error")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn env_directive_is_used() {
        let filter = build_filter(None, Some("launchdag=debug")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn defaults_to_info() {
        let filter = build_filter(None, None).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
        let blank = build_filter(None, Some("  ")).unwrap();
        assert_eq!(blank.max_level_hint(), Some(LevelFilter::INFO));
    }
}
