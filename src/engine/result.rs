// Fri Oct 16 2026 - Alex

use crate::error::{ContextError, TaskError};
use std::ops::Index;

/// Per-stage, per-task outcomes of one run. `None` marks a task that
/// succeeded. Only dispatched tasks have a slot, so a stage cut short by a
/// serial failure is shorter than its task list, and stages never reached
/// are absent.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResults {
    stages: Vec<Vec<Option<TaskError>>>,
    interrupted: Option<ContextError>,
}

impl ExecutionResults {
    pub(crate) fn with_capacity(stages: usize) -> Self {
        Self {
            stages: Vec::with_capacity(stages),
            interrupted: None,
        }
    }

    pub(crate) fn push_stage(&mut self, slots: Vec<Option<TaskError>>) {
        self.stages.push(slots);
    }

    pub(crate) fn set_interrupted(&mut self, reason: ContextError) {
        self.interrupted = Some(reason);
    }

    pub fn stages(&self) -> &[Vec<Option<TaskError>>] {
        &self.stages
    }

    /// Slots of stage `index`. Panics if that stage was never reached.
    pub fn stage(&self, index: usize) -> &[Option<TaskError>] {
        &self.stages[index]
    }

    pub fn get(&self, index: usize) -> Option<&[Option<TaskError>]> {
        self.stages.get(index).map(Vec::as_slice)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn slot_count(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    /// Every recorded failure, stage by stage in slot order.
    pub fn flatten_errors(&self) -> Vec<&TaskError> {
        self.stages.iter().flatten().flatten().collect()
    }

    pub fn first_error(&self) -> Option<&TaskError> {
        self.stages.iter().flatten().flatten().next()
    }

    pub fn error_count(&self) -> usize {
        self.stages.iter().flatten().filter(|slot| slot.is_some()).count()
    }

    pub fn is_success(&self) -> bool {
        self.interrupted.is_none() && self.error_count() == 0
    }

    /// Set when the context finished before every dispatched outcome arrived.
    pub fn interrupted(&self) -> Option<ContextError> {
        self.interrupted
    }
}

impl Index<usize> for ExecutionResults {
    type Output = [Option<TaskError>];

    fn index(&self, index: usize) -> &Self::Output {
        self.stage(index)
    }
}

/// What a run hands back: the slots plus one error summarizing why the run
/// stopped, if it did.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub results: ExecutionResults,
    pub error: Option<TaskError>,
}

impl ExecutionOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> Result<ExecutionResults, TaskError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.results),
        }
    }

    pub fn into_parts(self) -> (ExecutionResults, Option<TaskError>) {
        (self.results, self.error)
    }
}
