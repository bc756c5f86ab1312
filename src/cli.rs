// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::{FailurePolicy, LinkMode};

/// Command-line arguments for `launchdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "launchdag",
    version,
    about = "Provision and launch a game installation as a graph of dependent steps.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Launchdag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Launchdag.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LAUNCHDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the launch plan, but don't execute any step.
    #[arg(long)]
    pub dry_run: bool,

    /// Override `[scheduler].concurrency_limit`.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Override `[scheduler].tick_interval_ms`.
    #[arg(long, value_name = "MS")]
    pub tick_ms: Option<u64>,

    /// Override `[scheduler].failure_policy` ("stall" or "abort").
    #[arg(long, value_name = "POLICY")]
    pub failure_policy: Option<FailurePolicy>,

    /// Override `[install].link_mode` ("hardlink" or "copy").
    #[arg(long, value_name = "MODE")]
    pub link_mode: Option<LinkMode>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
