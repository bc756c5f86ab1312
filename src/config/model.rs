// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::{FailurePolicy, LinkMode};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [scheduler]
/// concurrency_limit = 4
///
/// [install]
/// root = "install"
///
/// [step.dirs]
/// kind = "prepare"
/// dirs = ["game", "game/mods"]
///
/// [step.mods]
/// kind = "sync"
/// source = "mod-cache"
/// target = "game/mods"
/// after = ["dirs"]
/// ```
///
/// All sections are optional and have reasonable defaults, but validation
/// requires at least one step.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub install: InstallSection,

    /// All steps from `[step.<name>]`, keyed by step name.
    #[serde(default)]
    pub step: BTreeMap<String, StepConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (or the
/// loader), so holders can rely on the plan being a valid DAG.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    scheduler: SchedulerSection,
    install: InstallSection,
    step: BTreeMap<String, StepConfig>,
    /// Directory relative install paths are resolved against.
    base_dir: PathBuf,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        install: InstallSection,
        step: BTreeMap<String, StepConfig>,
    ) -> Self {
        Self {
            scheduler,
            install,
            step,
            base_dir: PathBuf::from("."),
        }
    }

    /// Resolve relative paths against `dir` instead of the working directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn scheduler(&self) -> &SchedulerSection {
        &self.scheduler
    }

    pub fn install(&self) -> &InstallSection {
        &self.install
    }

    pub fn steps(&self) -> &BTreeMap<String, StepConfig> {
        &self.step
    }

    pub fn step(&self, name: &str) -> Option<&StepConfig> {
        self.step.get(name)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Effective install root: `install.root` resolved against the base dir.
    pub fn install_root(&self) -> PathBuf {
        match &self.install.root {
            Some(root) => self.base_dir.join(root),
            None => self.base_dir.clone(),
        }
    }

    /// Resolve a step path against the install root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.install_root().join(path)
    }

    pub(crate) fn scheduler_mut(&mut self) -> &mut SchedulerSection {
        &mut self.scheduler
    }

    pub(crate) fn install_mut(&mut self) -> &mut InstallSection {
        &mut self.install
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Maximum number of slot-consuming steps running at once.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Time between two scheduling passes.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// `"stall"` (default) or `"abort"`.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Log overall progress every N ticks.
    #[serde(default = "default_report_every")]
    pub report_every: u64,
}

fn default_concurrency_limit() -> usize {
    4
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_report_every() -> u64 {
    20
}

impl SchedulerSection {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            tick_interval_ms: default_tick_interval_ms(),
            failure_policy: FailurePolicy::default(),
            report_every: default_report_every(),
        }
    }
}

/// `[install]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct InstallSection {
    /// Base directory for relative step paths. Relative values are resolved
    /// against the config file's directory.
    #[serde(default)]
    pub root: Option<String>,

    /// `"hardlink"` (default) or `"copy"`.
    #[serde(default)]
    pub link_mode: LinkMode,
}

/// Kind of work a `[step.<name>]` performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Create directories.
    Prepare,
    /// Check that a file exists (and optionally matches a blake3 digest).
    Verify,
    /// Reconcile a source directory into a target directory.
    Sync,
    /// Start the game process.
    Launch,
}

impl StepKind {
    /// Whether a step of this kind counts against the concurrency limit
    /// when `takes_slot` is not set explicitly.
    pub fn takes_slot_by_default(self) -> bool {
        matches!(self, StepKind::Verify | StepKind::Sync)
    }
}

/// `[step.<name>]` section.
///
/// Kind-specific keys are optional here and checked during validation.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub kind: StepKind,

    /// Steps whose whole branch must finish before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// Override whether this step counts against `concurrency_limit`.
    #[serde(default)]
    pub takes_slot: Option<bool>,

    /// `prepare`: directories to create.
    #[serde(default)]
    pub dirs: Vec<String>,

    /// `verify`: file to check.
    #[serde(default)]
    pub file: Option<String>,

    /// `verify`: expected blake3 digest (hex).
    #[serde(default)]
    pub blake3: Option<String>,

    /// `sync`: directory to read from.
    #[serde(default)]
    pub source: Option<String>,

    /// `sync`: directory to deploy into.
    #[serde(default)]
    pub target: Option<String>,

    /// `sync`: glob patterns (relative to `source`) to include.
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// `sync`: glob patterns to skip.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// `sync`: remove target files that no longer exist in the source.
    #[serde(default)]
    pub prune: bool,

    /// `launch`: command line.
    #[serde(default)]
    pub cmd: Option<String>,

    /// `launch`: working directory.
    #[serde(default)]
    pub cwd: Option<String>,

    /// `launch`: regex; the step finishes once a stdout line matches.
    #[serde(default)]
    pub ready_on_stdout: Option<String>,

    /// `launch`: directory receiving the output of a game left running
    /// (`ready_on_stdout`). Defaults to `logs` under the install root.
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}

impl StepConfig {
    /// Bare step of the given kind; kind-specific fields left empty.
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            after: Vec::new(),
            takes_slot: None,
            dirs: Vec::new(),
            file: None,
            blake3: None,
            source: None,
            target: None,
            include: default_include(),
            exclude: Vec::new(),
            prune: false,
            cmd: None,
            cwd: None,
            ready_on_stdout: None,
            log_dir: None,
        }
    }
}
