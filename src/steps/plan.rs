// src/steps/plan.rs

//! Turn a validated config into root nodes ready for submission.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;
use tracing::debug;

use crate::config::{ConfigFile, StepConfig, StepKind};
use crate::dag::{NodeId, TaskNode};
use crate::errors::LaunchdagError;
use crate::exec::ProcessSpec;
use crate::steps::{FileFilter, LaunchGame, PrepareDirs, SyncDir, VerifyFile};

/// Output directory of launched games, relative to the install root.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Root nodes in dependency order plus the id assigned to every step name.
#[derive(Debug)]
pub struct LaunchPlan {
    nodes: Vec<TaskNode>,
    ids: BTreeMap<String, NodeId>,
}

impl LaunchPlan {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn id_of(&self, step: &str) -> Option<NodeId> {
        self.ids.get(step).copied()
    }

    pub fn ids(&self) -> &BTreeMap<String, NodeId> {
        &self.ids
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<TaskNode> {
        self.nodes
    }
}

/// Build one root node per `[step.<name>]`.
///
/// Nodes are created in topological order so every `after` name already has
/// an id when its dependent is built. Ties are broken by step name.
pub fn build_plan(cfg: &ConfigFile) -> Result<LaunchPlan> {
    let order = step_order(cfg)?;

    let mut nodes = Vec::with_capacity(order.len());
    let mut ids = BTreeMap::new();
    for name in order {
        let step_cfg = cfg
            .step(&name)
            .ok_or_else(|| LaunchdagError::StepNotFound(name.clone()))?;

        let deps = step_cfg
            .after
            .iter()
            .map(|dep| {
                ids.get(dep)
                    .copied()
                    .ok_or_else(|| LaunchdagError::StepNotFound(dep.clone()))
            })
            .collect::<std::result::Result<Vec<NodeId>, _>>()?;

        let mut node = build_node(cfg, &name, step_cfg)
            .with_context(|| format!("building step '{name}'"))?
            .after(deps);
        if let Some(takes_slot) = step_cfg.takes_slot {
            node = node.with_slot(takes_slot);
        }

        debug!(step = %name, node = %node.id(), takes_slot = node.takes_slot(), "planned step");
        ids.insert(name, node.id());
        nodes.push(node);
    }

    Ok(LaunchPlan { nodes, ids })
}

fn step_order(cfg: &ConfigFile) -> Result<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in cfg.steps().keys() {
        graph.add_node(name.as_str());
    }
    for (name, step) in cfg.steps() {
        for dep in &step.after {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // Nodes go in name order, so the order among independent steps is
    // stable between runs.
    let order = toposort(&graph, None).map_err(|cycle| {
        LaunchdagError::PlanCycle(format!(
            "cycle detected in launch plan involving step '{}'",
            cycle.node_id()
        ))
    })?;

    Ok(order.into_iter().map(str::to_string).collect())
}

fn build_node(cfg: &ConfigFile, name: &str, step: &StepConfig) -> Result<TaskNode> {
    let node = match step.kind {
        StepKind::Prepare => {
            let dirs = step.dirs.iter().map(|d| cfg.resolve(d)).collect();
            TaskNode::new(PrepareDirs::new(name, dirs))
        }
        StepKind::Verify => {
            let file = required(name, "file", step.file.as_deref())?;
            TaskNode::new(VerifyFile::new(name, cfg.resolve(file), step.blake3.clone()))
        }
        StepKind::Sync => {
            let source = required(name, "source", step.source.as_deref())?;
            let target = required(name, "target", step.target.as_deref())?;
            let filter = FileFilter::new(&step.include, &step.exclude)?;
            TaskNode::new(SyncDir::new(
                name,
                cfg.resolve(source),
                cfg.resolve(target),
                filter,
                step.prune,
                cfg.install().link_mode,
            ))
        }
        StepKind::Launch => {
            let cmd = required(name, "cmd", step.cmd.as_deref())?;
            let ready_on_stdout = step
                .ready_on_stdout
                .as_deref()
                .map(Regex::new)
                .transpose()
                .context("compiling ready_on_stdout")?;
            let cwd = match &step.cwd {
                Some(cwd) => cfg.resolve(cwd),
                None => cfg.install_root(),
            };
            let log_dir = cfg.resolve(step.log_dir.as_deref().unwrap_or(DEFAULT_LOG_DIR));
            TaskNode::new(LaunchGame::new(ProcessSpec {
                label: name.to_string(),
                cmd: cmd.to_string(),
                cwd: Some(cwd),
                ready_on_stdout,
                log_dir: Some(log_dir),
            }))
        }
    };
    Ok(node)
}

fn required<'a>(step: &str, key: &str, value: Option<&'a str>) -> Result<&'a str> {
    value.ok_or_else(|| {
        LaunchdagError::ConfigError(format!("step '{step}' requires `{key}`")).into()
    })
}
