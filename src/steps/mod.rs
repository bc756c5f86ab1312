// src/steps/mod.rs

//! Concrete launch steps and the plan builder.
//!
//! Each `[step.<name>]` kind maps to one [`Step`](crate::dag::Step)
//! implementation:
//!
//! - `prepare` -> [`PrepareDirs`]
//! - `verify`  -> [`VerifyFile`]
//! - `sync`    -> [`SyncDir`], which spawns [`DeployFile`] / [`RemoveFile`]
//!   children once it knows what changed
//! - `launch`  -> [`LaunchGame`]

pub mod deploy;
pub mod hash;
pub mod launch;
pub mod patterns;
pub mod plan;
pub mod prepare;
pub mod sync;
pub mod verify;

pub use deploy::{DeployFile, RemoveFile};
pub use launch::LaunchGame;
pub use patterns::FileFilter;
pub use plan::{DEFAULT_LOG_DIR, LaunchPlan, build_plan};
pub use prepare::PrepareDirs;
pub use sync::{SyncDir, SyncPlan};
pub use verify::VerifyFile;
