// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod steps;
pub mod types;

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::config::validate::validate_scheduler_values;
use crate::dag::TaskManager;
use crate::engine::{DriveOutcome, Driver, DriverEvent, DriverOptions};
use crate::errors::LaunchdagError;
use crate::steps::{DEFAULT_LOG_DIR, build_plan};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ CLI overrides)
/// - plan building
/// - task manager / driver
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;
    apply_overrides(&mut cfg, &args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let plan = build_plan(&cfg)?;
    info!(steps = plan.len(), root = ?cfg.install_root(), "launch plan built");

    let (tx, rx) = mpsc::channel::<DriverEvent>(16);

    // Ctrl-C → graceful shutdown.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        let _ = tx.send(DriverEvent::ShutdownRequested).await;
    });

    let mut manager = TaskManager::new(cfg.scheduler().concurrency_limit);
    manager.submit_all(plan.into_nodes());

    let options = DriverOptions::from_scheduler(cfg.scheduler(), true);
    let mut driver = Driver::new(manager, rx, options);
    let summary = driver.run().await;

    println!("launchdag: {summary}");
    match summary.outcome {
        DriveOutcome::Completed => Ok(()),
        outcome => Err(LaunchdagError::RunIncomplete(format!(
            "{outcome} with {} failed step(s)",
            summary.failures.len()
        ))
        .into()),
    }
}

/// Apply the CLI scheduler/install overrides on top of the loaded config.
fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> Result<()> {
    if let Some(mode) = args.link_mode {
        cfg.install_mut().link_mode = mode;
    }
    let scheduler = cfg.scheduler_mut();
    if let Some(policy) = args.failure_policy {
        scheduler.failure_policy = policy;
    }
    if let Some(limit) = args.concurrency {
        scheduler.concurrency_limit = limit;
    }
    if let Some(ms) = args.tick_ms {
        scheduler.tick_interval_ms = ms;
    }
    validate_scheduler_values(
        scheduler.concurrency_limit,
        scheduler.tick_interval_ms,
        scheduler.report_every,
    )?;
    Ok(())
}

/// Simple dry-run output: print scheduler settings and steps.
fn print_dry_run(cfg: &ConfigFile) {
    let scheduler = cfg.scheduler();
    println!("launchdag dry-run");
    println!("  scheduler.concurrency_limit = {}", scheduler.concurrency_limit);
    println!("  scheduler.tick_interval_ms = {}", scheduler.tick_interval_ms);
    println!("  scheduler.failure_policy = {:?}", scheduler.failure_policy);
    println!("  install.root = {}", cfg.install_root().display());
    println!("  install.link_mode = {:?}", cfg.install().link_mode);
    println!();

    println!("steps ({}):", cfg.steps().len());
    for (name, step) in cfg.steps() {
        println!("  - {name} ({:?})", step.kind);
        if !step.after.is_empty() {
            println!("      after: {:?}", step.after);
        }
        println!(
            "      takes_slot: {}",
            step.takes_slot.unwrap_or(step.kind.takes_slot_by_default())
        );
        if !step.dirs.is_empty() {
            println!("      dirs: {:?}", step.dirs);
        }
        if let Some(ref file) = step.file {
            println!("      file: {file}");
        }
        if let (Some(source), Some(target)) = (&step.source, &step.target) {
            println!("      sync: {source} -> {target} (prune: {})", step.prune);
        }
        if let Some(ref cmd) = step.cmd {
            println!("      cmd: {cmd}");
        }
        if let Some(ref ready) = step.ready_on_stdout {
            println!("      ready_on_stdout: {ready}");
            println!(
                "      log_dir: {}",
                step.log_dir.as_deref().unwrap_or(DEFAULT_LOG_DIR)
            );
        }
    }

    debug!("dry-run complete (no execution)");
}
