// src/steps/verify.rs

//! `verify` step: make sure a file is present and intact.

use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::info;

use crate::dag::{Step, StepContext, StepFuture};
use crate::steps::hash::hash_file_with_progress;

/// Checks that `path` exists and, if a digest is configured, that its blake3
/// hash matches. Progress is reported in bytes hashed.
#[derive(Debug, Clone)]
pub struct VerifyFile {
    label: String,
    path: PathBuf,
    expected: Option<String>,
}

impl VerifyFile {
    pub fn new(label: impl Into<String>, path: PathBuf, expected: Option<String>) -> Self {
        Self {
            label: label.into(),
            path,
            expected: expected.map(|d| d.to_ascii_lowercase()),
        }
    }
}

impl Step for VerifyFile {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn body(&mut self, ctx: StepContext) -> StepFuture {
        let path = self.path.clone();
        let expected = self.expected.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
                let meta = std::fs::metadata(&path)
                    .with_context(|| format!("required file {:?} is missing", path))?;
                if !meta.is_file() {
                    bail!("{:?} is not a regular file", path);
                }

                let Some(expected) = expected else {
                    info!(step = %ctx.label(), file = ?path, "file present");
                    return Ok(());
                };

                ctx.work().reset(meta.len());
                let actual = hash_file_with_progress(&path, ctx.work(), ctx.cancel_token())?;
                if actual != expected {
                    bail!(
                        "checksum mismatch for {:?}: expected {}, got {}",
                        path,
                        expected,
                        actual
                    );
                }
                info!(step = %ctx.label(), file = ?path, "checksum verified");
                Ok(())
            })
            .await?
        })
    }
}
