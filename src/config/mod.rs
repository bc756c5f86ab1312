// src/config/mod.rs

//! Configuration: TOML model, loading, and validation.
//!
//! `RawConfigFile` is what serde produces; `ConfigFile` is what the rest of
//! the crate accepts. The only way from one to the other is
//! `ConfigFile::try_from`, which runs all semantic checks.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, InstallSection, RawConfigFile, SchedulerSection, StepConfig, StepKind};
