#![allow(dead_code)]

use std::path::Path;

use launchdag::config::{ConfigFile, RawConfigFile, StepConfig, StepKind};
use launchdag::errors::Result;
use launchdag::types::{FailurePolicy, LinkMode};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_step(mut self, name: &str, step: StepConfig) -> Self {
        self.config.step.insert(name.to_string(), step);
        self
    }

    pub fn concurrency(mut self, limit: usize) -> Self {
        self.config.scheduler.concurrency_limit = limit;
        self
    }

    pub fn tick_ms(mut self, ms: u64) -> Self {
        self.config.scheduler.tick_interval_ms = ms;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.scheduler.failure_policy = policy;
        self
    }

    pub fn install_root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.install.root = Some(root.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn link_mode(mut self, mode: LinkMode) -> Self {
        self.config.install.link_mode = mode;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn prepare(dirs: &[&str]) -> Self {
        let mut step = StepConfig::new(StepKind::Prepare);
        step.dirs = dirs.iter().map(|d| d.to_string()).collect();
        Self { step }
    }

    pub fn verify(file: &str) -> Self {
        let mut step = StepConfig::new(StepKind::Verify);
        step.file = Some(file.to_string());
        Self { step }
    }

    pub fn sync(source: &str, target: &str) -> Self {
        let mut step = StepConfig::new(StepKind::Sync);
        step.source = Some(source.to_string());
        step.target = Some(target.to_string());
        Self { step }
    }

    pub fn launch(cmd: &str) -> Self {
        let mut step = StepConfig::new(StepKind::Launch);
        step.cmd = Some(cmd.to_string());
        Self { step }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.step.after.push(dep.to_string());
        self
    }

    pub fn takes_slot(mut self, val: bool) -> Self {
        self.step.takes_slot = Some(val);
        self
    }

    pub fn blake3(mut self, digest: &str) -> Self {
        self.step.blake3 = Some(digest.to_string());
        self
    }

    /// Replaces the default `**/*` include list on first use.
    pub fn include(mut self, pattern: &str) -> Self {
        if self.step.include == ["**/*"] {
            self.step.include.clear();
        }
        self.step.include.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.step.exclude.push(pattern.to_string());
        self
    }

    pub fn prune(mut self, val: bool) -> Self {
        self.step.prune = val;
        self
    }

    pub fn cwd(mut self, dir: &str) -> Self {
        self.step.cwd = Some(dir.to_string());
        self
    }

    pub fn log_dir(mut self, dir: &str) -> Self {
        self.step.log_dir = Some(dir.to_string());
        self
    }

    pub fn ready_on_stdout(mut self, pattern: &str) -> Self {
        self.step.ready_on_stdout = Some(pattern.to_string());
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}
