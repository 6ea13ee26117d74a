// Fri Oct 16 2026 - Alex

use crate::task::Task;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
    Parallel,
    Serial,
}

impl fmt::Display for StageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageMode::Parallel => write!(f, "parallel"),
            StageMode::Serial => write!(f, "serial"),
        }
    }
}

/// An ordered group of tasks run either one after another or all at once.
/// A task's position is its result slot.
#[derive(Debug, Clone)]
pub struct Stage {
    mode: StageMode,
    tasks: Arc<[Task]>,
}

impl Stage {
    pub fn new<I>(mode: StageMode, tasks: I) -> Self
    where
        I: IntoIterator<Item = Task>,
    {
        Self {
            mode,
            tasks: tasks.into_iter().collect::<Vec<_>>().into(),
        }
    }

    pub fn parallel<I: IntoIterator<Item = Task>>(tasks: I) -> Self {
        Self::new(StageMode::Parallel, tasks)
    }

    pub fn serial<I: IntoIterator<Item = Task>>(tasks: I) -> Self {
        Self::new(StageMode::Serial, tasks)
    }

    pub fn mode(&self) -> StageMode {
        self.mode
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
