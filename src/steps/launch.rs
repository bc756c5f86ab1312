// src/steps/launch.rs

//! `launch` step: start the game.

use tracing::info;

use crate::dag::{Step, StepContext, StepFuture};
use crate::exec::{ProcessSpec, run_process};

/// Runs the configured game command.
///
/// With `ready_on_stdout` the step finishes as soon as the game reports it is
/// up; otherwise it finishes when the process exits successfully. Waiting on
/// the game is not real work, so by default this step does not take a slot.
#[derive(Debug, Clone)]
pub struct LaunchGame {
    spec: ProcessSpec,
}

impl LaunchGame {
    pub fn new(spec: ProcessSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }
}

impl Step for LaunchGame {
    fn label(&self) -> String {
        self.spec.label.clone()
    }

    fn takes_slot(&self) -> bool {
        false
    }

    fn body(&mut self, ctx: StepContext) -> StepFuture {
        let spec = self.spec.clone();
        Box::pin(async move {
            let outcome = run_process(&spec, ctx.cancel_token()).await?;
            info!(step = %ctx.label(), ?outcome, "launch step done");
            Ok::<(), anyhow::Error>(())
        })
    }
}
