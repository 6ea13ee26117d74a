// Fri Oct 16 2026 - Alex

use crate::context::ExecutionContext;
use crate::engine::Execution;
use crate::error::TaskError;
use crate::executor::{ImmediateExecutor, Job, PoolExecutor, ResultSink, SpawnExecutor, TaskExecutor};
use std::fmt;
use std::sync::Arc;

pub type TaskOutcome = Result<(), TaskError>;

pub type WorkFn = Arc<dyn Fn(&ExecutionContext) -> TaskOutcome + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOptions {
    pub recover_from_panic: bool,
    pub span_name: Option<String>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recover_from_panic(mut self, recover: bool) -> Self {
        self.recover_from_panic = recover;
        self
    }

    pub fn with_span_name<S: Into<String>>(mut self, name: S) -> Self {
        self.span_name = Some(name.into());
        self
    }

    /// The span name, if one is set and non-empty.
    pub fn span(&self) -> Option<&str> {
        self.span_name.as_deref().filter(|name| !name.is_empty())
    }
}

/// A work function bound to the executor that will run it.
///
/// Tasks are immutable: every modifier consumes the task and returns a new
/// one, and cloning only bumps reference counts. The same task may be
/// dispatched any number of times.
#[derive(Clone)]
pub struct Task {
    work: WorkFn,
    executor: Arc<dyn TaskExecutor>,
    options: TaskOptions,
    name: Option<Arc<str>>,
}

impl Task {
    pub fn new<F>(work: F, executor: Arc<dyn TaskExecutor>) -> Self
    where
        F: Fn(&ExecutionContext) -> TaskOutcome + Send + Sync + 'static,
    {
        Self {
            work: Arc::new(work),
            executor,
            options: TaskOptions::default(),
            name: None,
        }
    }

    /// Runs on the dispatching thread before dispatch returns.
    pub fn immediate<F>(work: F) -> Self
    where
        F: Fn(&ExecutionContext) -> TaskOutcome + Send + Sync + 'static,
    {
        Self::new(work, Arc::new(ImmediateExecutor))
    }

    /// Runs on a freshly spawned thread.
    pub fn spawned<F>(work: F) -> Self
    where
        F: Fn(&ExecutionContext) -> TaskOutcome + Send + Sync + 'static,
    {
        Self::new(work, Arc::new(SpawnExecutor::new()))
    }

    /// Runs on one of `pool`'s workers.
    pub fn pool<F>(work: F, pool: &PoolExecutor) -> Self
    where
        F: Fn(&ExecutionContext) -> TaskOutcome + Send + Sync + 'static,
    {
        Self::new(work, Arc::new(pool.clone()))
    }

    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn recover_from_panic(mut self) -> Self {
        self.options.recover_from_panic = true;
        self
    }

    pub fn with_observability_hook<S: Into<String>>(mut self, span_name: S) -> Self {
        self.options.span_name = Some(span_name.into());
        self
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(Arc::from(name));
        self
    }

    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn executor_name(&self) -> &str {
        self.executor.name()
    }

    /// A single-stage execution holding only this task.
    pub fn into_execution(self) -> Execution {
        Execution::from(self)
    }

    pub(crate) fn dispatch(&self, ctx: &ExecutionContext, sink: ResultSink) {
        let job = Job::new(self.work.clone(), self.options.clone(), sink);
        self.executor.execute(ctx, job);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name())
            .field("executor", &self.executor_name())
            .field("options", &self.options)
            .finish()
    }
}
