// src/steps/prepare.rs

//! `prepare` step: create the install directory layout.

use std::path::PathBuf;

use anyhow::Context;
use tracing::debug;

use crate::dag::{Step, StepContext, StepFuture};

/// Creates every directory in `dirs` (including missing parents).
///
/// Directory creation is cheap, so this step does not take a slot.
#[derive(Debug, Clone)]
pub struct PrepareDirs {
    label: String,
    dirs: Vec<PathBuf>,
}

impl PrepareDirs {
    pub fn new(label: impl Into<String>, dirs: Vec<PathBuf>) -> Self {
        Self {
            label: label.into(),
            dirs,
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl Step for PrepareDirs {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn takes_slot(&self) -> bool {
        false
    }

    fn body(&mut self, ctx: StepContext) -> StepFuture {
        let dirs = self.dirs.clone();
        Box::pin(async move {
            ctx.work().reset(dirs.len() as u64);
            tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
                for dir in dirs {
                    std::fs::create_dir_all(&dir)
                        .with_context(|| format!("creating directory {:?}", dir))?;
                    debug!(step = %ctx.label(), dir = ?dir, "directory ready");
                    ctx.work().advance(1);
                }
                Ok(())
            })
            .await?
        })
    }
}
