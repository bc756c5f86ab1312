// src/steps/patterns.rs

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled include/exclude glob patterns for a sync step.
///
/// Patterns are relative to the directory being walked; `matches` expects
/// paths like `"mods/foo.jar"` with forward slashes.
#[derive(Clone)]
pub struct FileFilter {
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for FileFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileFilter")
            .field("includes", &self.include_set.len())
            .field("excludes", &self.exclude_set.as_ref().map_or(0, GlobSet::len))
            .finish()
    }
}

impl FileFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include_set =
            build_globset(include).context("building include globset")?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };
        Ok(Self {
            include_set,
            exclude_set,
        })
    }

    /// Returns true if the relative path is included and not excluded.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Collect all files under `root` accepted by `filter`, as paths relative to
/// `root`, sorted.
///
/// A missing `root` yields an empty list.
pub fn collect_matching_files(root: &Path, filter: &FileFilter) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.is_dir() {
        return Ok(files);
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries =
            fs::read_dir(&dir).with_context(|| format!("reading directory {:?}", dir))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if filter.matches(&rel_str) {
                        files.push(rel.to_path_buf());
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
