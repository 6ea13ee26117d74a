// Fri Oct 16 2026 - Alex

//! Strategies that decide where a task's work runs.
//!
//! Every strategy receives a [`Job`] and must eventually call [`Job::run`]
//! (or drop the job). Whatever happens, exactly one outcome reaches the
//! waiting stage driver: a job dropped before it produced an outcome reports
//! itself as abandoned.

pub mod immediate;
pub mod panic;
pub mod pool;
pub mod spawn;
mod worker;

pub use immediate::ImmediateExecutor;
pub use pool::{PoolExecutor, PoolStats};
pub use spawn::SpawnExecutor;

use crate::context::ExecutionContext;
use crate::error::{ContextError, TaskError};
use crate::task::{TaskOptions, TaskOutcome, WorkFn};
use std::sync::mpsc::Sender;
use std::thread;

pub trait TaskExecutor: Send + Sync {
    /// Dispatches `job`. Implementations may run it inline or hand it to
    /// another thread; either way the job's outcome is delivered by the job
    /// itself.
    fn execute(&self, ctx: &ExecutionContext, job: Job);

    fn name(&self) -> &str;
}

/// Message received by a waiting stage driver.
pub(crate) enum Delivery {
    Outcome { task_id: usize, outcome: TaskOutcome },
    Done(ContextError),
}

pub(crate) struct ResultSink {
    task_id: usize,
    sender: Option<Sender<Delivery>>,
}

impl ResultSink {
    pub(crate) fn new(task_id: usize, sender: Sender<Delivery>) -> Self {
        Self {
            task_id,
            sender: Some(sender),
        }
    }

    pub(crate) fn task_id(&self) -> usize {
        self.task_id
    }

    pub(crate) fn deposit(mut self, outcome: TaskOutcome) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: TaskOutcome) {
        if let Some(sender) = self.sender.take() {
            // The driver may have stopped listening after a cancellation.
            let _ = sender.send(Delivery::Outcome {
                task_id: self.task_id,
                outcome,
            });
        }
    }
}

impl Drop for ResultSink {
    fn drop(&mut self) {
        if self.sender.is_none() {
            return;
        }
        let reason = if thread::panicking() {
            "task panicked without panic recovery"
        } else {
            "job was dropped before it ran"
        };
        self.send(Err(TaskError::abandoned(reason)));
    }
}

/// A dispatched unit of work together with the slot its outcome belongs to.
pub struct Job {
    work: WorkFn,
    options: TaskOptions,
    sink: ResultSink,
}

impl Job {
    pub(crate) fn new(work: WorkFn, options: TaskOptions, sink: ResultSink) -> Self {
        Self {
            work,
            options,
            sink,
        }
    }

    pub fn task_id(&self) -> usize {
        self.sink.task_id()
    }

    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    /// Runs the work on the current thread and delivers its outcome.
    pub fn run(self, ctx: &ExecutionContext) {
        let Job {
            work,
            options,
            sink,
        } = self;
        let outcome = invoke(&work, &options, ctx, sink.task_id());
        sink.deposit(outcome);
    }

    /// Delivers a failure without running the work.
    pub fn abandon(self, reason: &str) {
        log::warn!("Task {} abandoned: {}", self.task_id(), reason);
        self.sink.deposit(Err(TaskError::abandoned(reason)));
    }
}

fn invoke(work: &WorkFn, options: &TaskOptions, ctx: &ExecutionContext, task_id: usize) -> TaskOutcome {
    let Some(name) = options.span() else {
        return call(work, options, ctx, task_id);
    };

    let span = match ctx.span() {
        Some(parent) => tracing::info_span!(parent: parent, "task", name = name, task_id = task_id),
        None => tracing::info_span!("task", name = name, task_id = task_id),
    };
    let _entered = span.enter();
    let ctx = ctx.with_span(name, span.clone());
    call(work, options, &ctx, task_id)
}

fn call(work: &WorkFn, options: &TaskOptions, ctx: &ExecutionContext, task_id: usize) -> TaskOutcome {
    if !options.recover_from_panic {
        return work(ctx);
    }

    let outcome = panic::recover(|| work(ctx));
    if let Err(TaskError::Panic { message, .. }) = &outcome {
        log::warn!("Recovered panic in task {}: {}", task_id, message);
    }
    outcome
}
