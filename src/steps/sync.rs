// src/steps/sync.rs

//! `sync` step: reconcile a source directory into the install.
//!
//! The body only *plans*: it walks both trees and decides which files need to
//! be deployed and which are stale. The actual file operations are emitted as
//! child nodes from the continuation, so they are scheduled (and limited) like
//! any other work.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, bail};
use tracing::{debug, info};

use crate::dag::{CancelToken, Step, StepContext, StepFuture, TaskNode, WorkProgress};
use crate::steps::deploy::{DeployFile, RemoveFile};
use crate::steps::hash::same_contents;
use crate::steps::patterns::{FileFilter, collect_matching_files};
use crate::types::LinkMode;

/// Outcome of the planning pass, as paths relative to source/target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub deploy: Vec<PathBuf>,
    pub remove: Vec<PathBuf>,
    pub unchanged: usize,
}

#[derive(Debug, Clone)]
pub struct SyncDir {
    label: String,
    source: PathBuf,
    target: PathBuf,
    filter: Arc<FileFilter>,
    prune: bool,
    link_mode: LinkMode,
    plan: Arc<Mutex<Option<SyncPlan>>>,
}

impl SyncDir {
    pub fn new(
        label: impl Into<String>,
        source: PathBuf,
        target: PathBuf,
        filter: FileFilter,
        prune: bool,
        link_mode: LinkMode,
    ) -> Self {
        Self {
            label: label.into(),
            source,
            target,
            filter: Arc::new(filter),
            prune,
            link_mode,
            plan: Arc::new(Mutex::new(None)),
        }
    }

    /// Plan computed by the body, if it has run.
    pub fn plan(&self) -> Option<SyncPlan> {
        self.plan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Step for SyncDir {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn body(&mut self, ctx: StepContext) -> StepFuture {
        let source = self.source.clone();
        let target = self.target.clone();
        let filter = Arc::clone(&self.filter);
        let prune = self.prune;
        let slot = Arc::clone(&self.plan);
        Box::pin(async move {
            let plan = tokio::task::spawn_blocking(move || {
                plan_sync(
                    &source,
                    &target,
                    &filter,
                    prune,
                    ctx.work(),
                    ctx.cancel_token(),
                )
            })
            .await??;

            info!(
                deploy = plan.deploy.len(),
                remove = plan.remove.len(),
                unchanged = plan.unchanged,
                "sync planned"
            );
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(plan);
            Ok::<(), anyhow::Error>(())
        })
    }

    fn continuation(&mut self, ctx: &StepContext) -> anyhow::Result<Vec<TaskNode>> {
        if ctx.is_cancelled() {
            info!(step = %self.label, "sync cancelled; not deploying");
            return Ok(Vec::new());
        }

        let Some(plan) = self
            .plan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            bail!("sync step '{}' finished without a plan", self.label);
        };

        let mut children = Vec::with_capacity(plan.deploy.len() + plan.remove.len());
        for rel in &plan.deploy {
            children.push(TaskNode::new(DeployFile::new(
                format!("deploy {}", display_rel(rel)),
                self.source.join(rel),
                self.target.join(rel),
                self.link_mode,
            )));
        }
        for rel in &plan.remove {
            children.push(TaskNode::new(RemoveFile::new(
                format!("remove {}", display_rel(rel)),
                self.target.join(rel),
            )));
        }
        Ok(children)
    }
}

fn display_rel(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

/// Walk `source` and `target` and decide what has to change.
///
/// Progress is one unit per examined file.
pub fn plan_sync(
    source: &Path,
    target: &Path,
    filter: &FileFilter,
    prune: bool,
    work: &WorkProgress,
    cancel: &CancelToken,
) -> anyhow::Result<SyncPlan> {
    if !source.is_dir() {
        bail!("sync source {:?} is not a directory", source);
    }

    let source_files = collect_matching_files(source, filter)
        .with_context(|| format!("scanning {:?}", source))?;
    let stale_candidates = if prune {
        collect_matching_files(target, filter)
            .with_context(|| format!("scanning {:?}", target))?
    } else {
        Vec::new()
    };
    work.reset((source_files.len() + stale_candidates.len()) as u64);

    let mut plan = SyncPlan::default();
    for rel in &source_files {
        if cancel.is_cancelled() {
            bail!("sync of {:?} cancelled", source);
        }
        let dst = target.join(rel);
        if dst.is_file() && same_contents(&source.join(rel), &dst)? {
            plan.unchanged += 1;
        } else {
            debug!(file = %display_rel(rel), "needs deploy");
            plan.deploy.push(rel.clone());
        }
        work.advance(1);
    }

    let wanted: BTreeSet<&PathBuf> = source_files.iter().collect();
    for rel in stale_candidates {
        if !wanted.contains(&rel) {
            debug!(file = %display_rel(&rel), "stale");
            plan.remove.push(rel);
        }
        work.advance(1);
    }

    Ok(plan)
}
