// src/config/validate.rs

use globset::Glob;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile, StepConfig, StepKind};
use crate::errors::{LaunchdagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::LaunchdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.scheduler, raw.install, raw.step))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_steps(cfg)?;
    validate_scheduler(cfg)?;
    for (name, step) in cfg.step.iter() {
        validate_step(name, step)?;
    }
    validate_step_dependencies(cfg)?;
    validate_plan(cfg)?;
    Ok(())
}

fn ensure_has_steps(cfg: &RawConfigFile) -> Result<()> {
    if cfg.step.is_empty() {
        return Err(LaunchdagError::ConfigError(
            "config must contain at least one [step.<name>] section".to_string(),
        ));
    }
    Ok(())
}

/// Check a `[scheduler]` section. Also used for CLI overrides.
pub(crate) fn validate_scheduler_values(
    concurrency_limit: usize,
    tick_interval_ms: u64,
    report_every: u64,
) -> Result<()> {
    if concurrency_limit == 0 {
        return Err(LaunchdagError::ConfigError(
            "[scheduler].concurrency_limit must be >= 1 (got 0)".to_string(),
        ));
    }
    if tick_interval_ms == 0 {
        return Err(LaunchdagError::ConfigError(
            "[scheduler].tick_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if report_every == 0 {
        return Err(LaunchdagError::ConfigError(
            "[scheduler].report_every must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler(cfg: &RawConfigFile) -> Result<()> {
    // failure_policy and link_mode are typed and checked by serde.
    let s = &cfg.scheduler;
    validate_scheduler_values(s.concurrency_limit, s.tick_interval_ms, s.report_every)
}

fn validate_step(name: &str, step: &StepConfig) -> Result<()> {
    match step.kind {
        StepKind::Prepare => {
            if step.dirs.is_empty() {
                return Err(missing_key(name, "prepare", "dirs"));
            }
        }
        StepKind::Verify => {
            if step.file.is_none() {
                return Err(missing_key(name, "verify", "file"));
            }
            if let Some(digest) = &step.blake3 {
                let valid = digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit());
                if !valid {
                    return Err(LaunchdagError::ConfigError(format!(
                        "step '{}': `blake3` must be 64 hex characters (got '{}')",
                        name, digest
                    )));
                }
            }
        }
        StepKind::Sync => {
            if step.source.is_none() {
                return Err(missing_key(name, "sync", "source"));
            }
            if step.target.is_none() {
                return Err(missing_key(name, "sync", "target"));
            }
            if step.include.is_empty() {
                return Err(LaunchdagError::ConfigError(format!(
                    "step '{}': `include` must not be empty",
                    name
                )));
            }
            for pat in step.include.iter().chain(step.exclude.iter()) {
                if let Err(e) = Glob::new(pat) {
                    return Err(LaunchdagError::ConfigError(format!(
                        "step '{}': invalid glob pattern '{}': {}",
                        name, pat, e
                    )));
                }
            }
        }
        StepKind::Launch => {
            match &step.cmd {
                Some(cmd) if !cmd.trim().is_empty() => {}
                _ => return Err(missing_key(name, "launch", "cmd")),
            }
            if let Some(pattern) = &step.ready_on_stdout {
                if let Err(e) = Regex::new(pattern) {
                    return Err(LaunchdagError::ConfigError(format!(
                        "step '{}': invalid `ready_on_stdout` regex '{}': {}",
                        name, pattern, e
                    )));
                }
            }
        }
    }
    Ok(())
}

fn missing_key(name: &str, kind: &str, key: &str) -> LaunchdagError {
    LaunchdagError::ConfigError(format!(
        "step '{}' of kind '{}' requires `{}`",
        name, kind, key
    ))
}

fn validate_step_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, step) in cfg.step.iter() {
        for dep in step.after.iter() {
            if dep == name {
                return Err(LaunchdagError::ConfigError(format!(
                    "step '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !cfg.step.contains_key(dep) {
                return Err(LaunchdagError::StepNotFound(format!(
                    "step '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_plan(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> step
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.step.keys() {
        graph.add_node(name.as_str());
    }

    for (name, step) in cfg.step.iter() {
        for dep in step.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(LaunchdagError::PlanCycle(format!(
                "cycle detected in launch plan involving step '{}'",
                node
            )))
        }
    }
}
