// src/steps/deploy.rs

//! Per-file children produced by a sync step.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::dag::{Step, StepContext, StepFuture};
use crate::types::LinkMode;

/// Materialise one source file at its target location.
#[derive(Debug, Clone)]
pub struct DeployFile {
    label: String,
    source: PathBuf,
    target: PathBuf,
    link_mode: LinkMode,
}

impl DeployFile {
    pub fn new(label: impl Into<String>, source: PathBuf, target: PathBuf, link_mode: LinkMode) -> Self {
        Self {
            label: label.into(),
            source,
            target,
            link_mode,
        }
    }
}

impl Step for DeployFile {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn body(&mut self, ctx: StepContext) -> StepFuture {
        let source = self.source.clone();
        let target = self.target.clone();
        let link_mode = self.link_mode;
        Box::pin(async move {
            tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
                let size = fs::metadata(&source)
                    .with_context(|| format!("stat {:?}", source))?
                    .len();
                ctx.work().reset(size);

                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("creating directory {:?}", parent))?;
                }
                remove_if_present(&target)?;
                place_file(&source, &target, link_mode)?;

                ctx.work().set_completed(size);
                debug!(step = %ctx.label(), target = ?target, ?link_mode, "file deployed");
                Ok(())
            })
            .await?
        })
    }
}

fn place_file(source: &Path, target: &Path, link_mode: LinkMode) -> anyhow::Result<()> {
    if link_mode == LinkMode::Hardlink {
        match fs::hard_link(source, target) {
            Ok(()) => return Ok(()),
            Err(e) => {
                debug!(source = ?source, error = %e, "hard link failed; copying instead");
            }
        }
    }
    fs::copy(source, target)
        .with_context(|| format!("copying {:?} to {:?}", source, target))?;
    Ok(())
}

fn remove_if_present(path: &Path) -> anyhow::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {:?}", path)),
    }
}

/// Delete a file that no longer belongs to the install.
///
/// Does not take a slot; a file that is already gone counts as success.
#[derive(Debug, Clone)]
pub struct RemoveFile {
    label: String,
    path: PathBuf,
}

impl RemoveFile {
    pub fn new(label: impl Into<String>, path: PathBuf) -> Self {
        Self {
            label: label.into(),
            path,
        }
    }
}

impl Step for RemoveFile {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn takes_slot(&self) -> bool {
        false
    }

    fn body(&mut self, ctx: StepContext) -> StepFuture {
        let path = self.path.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
                remove_if_present(&path)?;
                debug!(step = %ctx.label(), path = ?path, "stale file removed");
                Ok(())
            })
            .await?
        })
    }
}
