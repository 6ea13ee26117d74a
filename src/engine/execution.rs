// Fri Oct 16 2026 - Alex

use super::driver;
use super::result::ExecutionOutcome;
use super::runner::{self, ExecutionHandle};
use super::stage::{Stage, StageMode};
use super::switch::{self, Case};
use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::task::Task;
use std::sync::Arc;

/// An ordered list of stages.
///
/// Building is pure value composition: appending a stage returns a new
/// execution and leaves the one it was built from untouched, so any link of
/// a chain can be kept and run again later. Nothing runs until
/// [`Execution::wait`] or [`Execution::run_async`].
#[derive(Debug, Clone)]
pub struct Execution {
    stages: Arc<[Stage]>,
}

impl Execution {
    /// An execution with no stages; waiting on it succeeds immediately.
    pub fn new() -> Self {
        Self {
            stages: Arc::from(Vec::new()),
        }
    }

    pub fn parallel<I: IntoIterator<Item = Task>>(tasks: I) -> Self {
        Self::new().then(Stage::parallel(tasks))
    }

    pub fn serial<I: IntoIterator<Item = Task>>(tasks: I) -> Self {
        Self::new().then(Stage::serial(tasks))
    }

    /// Appends a parallel stage.
    pub fn execute_parallel<I: IntoIterator<Item = Task>>(&self, tasks: I) -> Execution {
        self.then(Stage::parallel(tasks))
    }

    /// Appends a serial stage.
    pub fn execute_serial<I: IntoIterator<Item = Task>>(&self, tasks: I) -> Execution {
        self.then(Stage::serial(tasks))
    }

    pub fn then(&self, stage: Stage) -> Execution {
        let mut stages = Vec::with_capacity(self.stages.len() + 1);
        stages.extend(self.stages.iter().cloned());
        stages.push(stage);
        Self {
            stages: stages.into(),
        }
    }

    /// Appends every stage of `other` after this execution's stages.
    pub fn chain(&self, other: &Execution) -> Execution {
        let stages: Vec<Stage> = self.stages.iter().chain(other.stages.iter()).cloned().collect();
        Self {
            stages: stages.into(),
        }
    }

    /// See [`switch`](super::switch::switch).
    pub fn switch<'a, I>(default: Execution, cases: I) -> Execution
    where
        I: IntoIterator<Item = Case<'a>>,
    {
        switch::switch(default, cases)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn task_count(&self) -> usize {
        self.stages.iter().map(Stage::task_count).sum()
    }

    pub fn modes(&self) -> Vec<StageMode> {
        self.stages.iter().map(Stage::mode).collect()
    }

    /// Runs every stage in order on the calling thread and reports the
    /// outcome. Returns early on the first failing stage, or as soon as `ctx`
    /// is cancelled or past its deadline; work already dispatched keeps
    /// running in that case.
    pub fn wait(&self, ctx: &ExecutionContext) -> ExecutionOutcome {
        driver::run_stages(&self.stages, ctx)
    }

    /// Runs [`Execution::wait`] on a new thread and hands the outcome to
    /// `callback` there.
    pub fn run_async<F>(&self, ctx: &ExecutionContext, callback: F) -> Result<ExecutionHandle, EngineError>
    where
        F: FnOnce(ExecutionOutcome) + Send + 'static,
    {
        runner::spawn(self.clone(), ctx.clone(), callback)
    }

    /// Like [`Execution::run_async`], with the outcome kept in the handle.
    pub fn spawn(&self, ctx: &ExecutionContext) -> Result<ExecutionHandle, EngineError> {
        runner::spawn_collecting(self.clone(), ctx.clone())
    }
}

impl Default for Execution {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Task> for Execution {
    fn from(task: Task) -> Self {
        Execution::serial([task])
    }
}

impl From<Stage> for Execution {
    fn from(stage: Stage) -> Self {
        Execution::new().then(stage)
    }
}

pub fn execute_parallel<I: IntoIterator<Item = Task>>(tasks: I) -> Execution {
    Execution::parallel(tasks)
}

pub fn execute_serial<I: IntoIterator<Item = Task>>(tasks: I) -> Execution {
    Execution::serial(tasks)
}
