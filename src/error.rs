// Fri Oct 16 2026 - Alex

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub const CHAIN_DELIMITER: &str = "; ";

/// Failure of a single task, or the summary of several failures from one stage.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("{0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync>),
    #[error("panic: {message}\n{stack}")]
    Panic { message: String, stack: String },
    #[error("{}", join_messages(.0))]
    Chained(Vec<TaskError>),
    #[error("interrupted: {0}")]
    Interrupted(ContextError),
    #[error("outcome abandoned: {0}")]
    Abandoned(String),
}

#[derive(Error, Debug)]
#[error("{0}")]
struct Message(String);

fn join_messages(errors: &[TaskError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(CHAIN_DELIMITER)
}

impl TaskError {
    pub fn msg<S: Into<String>>(message: S) -> Self {
        TaskError::Failed(Arc::new(Message(message.into())))
    }

    pub fn new<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        TaskError::Failed(Arc::new(error))
    }

    pub fn panic<S: Into<String>>(message: S, stack: String) -> Self {
        TaskError::Panic {
            message: message.into(),
            stack,
        }
    }

    pub fn abandoned<S: Into<String>>(reason: S) -> Self {
        TaskError::Abandoned(reason.into())
    }

    /// Combines the failures of one stage, in slot order. A single failure is
    /// returned as is; no failures yields `None`.
    pub fn chain(mut errors: Vec<TaskError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(TaskError::Chained(errors)),
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panic { .. })
    }

    pub fn is_chained(&self) -> bool {
        matches!(self, TaskError::Chained(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, TaskError::Interrupted(_))
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, TaskError::Abandoned(_))
    }

    /// Constituent failures of a chained error; a plain error yields itself.
    pub fn chained(&self) -> &[TaskError] {
        match self {
            TaskError::Chained(errors) => errors,
            other => std::slice::from_ref(other),
        }
    }

    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            TaskError::Failed(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<ContextError> for TaskError {
    fn from(e: ContextError) -> Self {
        TaskError::Interrupted(e)
    }
}

/// Why an execution context stopped accepting waits.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Execution thread terminated without reporting")]
    NoOutcome,
    #[error("Execution thread panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid worker count: {value} (must be > 0)")]
    InvalidWorkerCount { value: usize },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
