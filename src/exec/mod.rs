// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `Dispatcher` trait the manager hands started
//!   bodies to, and the `TokioDispatcher` used in production. Tests replace
//!   it with a dispatcher that lets them decide when bodies complete.
//! - [`process`] runs external commands (the game process) with stdout
//!   readiness matching and cooperative cancellation.

pub mod backend;
pub mod process;

pub use backend::{BodyJob, Dispatcher, TokioDispatcher};
pub use process::{ProcessOutcome, ProcessSpec, run_process};
