// Fri Oct 16 2026 - Alex

//! The stage driver behind [`Execution::wait`](super::Execution::wait).
//!
//! Stages run strictly in order. A serial stage dispatches one task at a
//! time and stops everything at the first failure; a parallel stage
//! dispatches all of its tasks, waits for every outcome and folds the
//! failures into one chained error. Every wait races against the context;
//! a finished context ends the run at once with whatever has arrived.

use super::result::{ExecutionOutcome, ExecutionResults};
use super::stage::{Stage, StageMode};
use crate::context::{DoneGuard, ExecutionContext};
use crate::error::{ContextError, TaskError};
use crate::executor::{Delivery, ResultSink};
use crate::task::TaskOutcome;
use std::cell::Cell;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::Instant;

/// Channel every outcome of one run, and the context's cancellation, arrive on.
struct Listener {
    sender: Sender<Delivery>,
    receiver: Receiver<Delivery>,
    done: Cell<Option<ContextError>>,
    _done: DoneGuard,
}

impl Listener {
    fn new(ctx: &ExecutionContext) -> Self {
        let (sender, receiver) = channel();
        let waker = sender.clone();
        let done = ctx.on_done(move |reason| {
            let _ = waker.send(Delivery::Done(reason));
        });

        Self {
            sender,
            receiver,
            done: Cell::new(None),
            _done: done,
        }
    }

    fn sink(&self, task_id: usize) -> ResultSink {
        ResultSink::new(task_id, self.sender.clone())
    }

    /// Next outcome, or why the context finished. Outcomes that already
    /// arrived are handed out before the context's reason, even when the
    /// wake-up was queued first.
    fn next(&self, ctx: &ExecutionContext) -> Result<(usize, TaskOutcome), ContextError> {
        if let Some(reason) = self.done.get() {
            return self.arrived().ok_or(reason);
        }

        // `self.sender` keeps the channel connected, so a disconnect cannot
        // happen while the listener exists.
        let delivery = match ctx.deadline() {
            None => self.receiver.recv().map_err(|_| ContextError::Cancelled),
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                self.receiver.recv_timeout(remaining).map_err(|e| match e {
                    RecvTimeoutError::Timeout => ContextError::DeadlineExceeded,
                    RecvTimeoutError::Disconnected => ContextError::Cancelled,
                })
            }
        };

        match delivery {
            Ok(Delivery::Outcome { task_id, outcome }) => Ok((task_id, outcome)),
            Ok(Delivery::Done(reason)) | Err(reason) => {
                self.done.set(Some(reason));
                self.arrived().ok_or(reason)
            }
        }
    }

    /// The reason the context finished, once a wait has observed it.
    fn finished(&self) -> Option<ContextError> {
        self.done.get()
    }

    fn arrived(&self) -> Option<(usize, TaskOutcome)> {
        while let Ok(delivery) = self.receiver.try_recv() {
            if let Delivery::Outcome { task_id, outcome } = delivery {
                return Some((task_id, outcome));
            }
        }
        None
    }
}

struct StageRun {
    slots: Vec<Option<TaskError>>,
    error: Option<TaskError>,
    interrupted: Option<ContextError>,
}

pub(crate) fn run_stages(stages: &[Stage], ctx: &ExecutionContext) -> ExecutionOutcome {
    let listener = Listener::new(ctx);
    let mut results = ExecutionResults::with_capacity(stages.len());

    for (index, stage) in stages.iter().enumerate() {
        if let Some(reason) = listener.finished() {
            log::debug!("Not starting stage {}: {}", index, reason);
            results.set_interrupted(reason);
            return ExecutionOutcome {
                results,
                error: Some(TaskError::Interrupted(reason)),
            };
        }

        log::debug!(
            "Starting {} stage {} with {} tasks",
            stage.mode(),
            index,
            stage.task_count()
        );

        let run = match stage.mode() {
            StageMode::Serial => run_serial(stage, ctx, &listener),
            StageMode::Parallel => run_parallel(stage, ctx, &listener),
        };
        results.push_stage(run.slots);

        if let Some(reason) = run.interrupted {
            log::debug!("Stage {} interrupted: {}", index, reason);
            results.set_interrupted(reason);
            return ExecutionOutcome {
                results,
                error: Some(TaskError::Interrupted(reason)),
            };
        }

        if let Some(error) = run.error {
            log::debug!("Stage {} failed: {}", index, error);
            return ExecutionOutcome {
                results,
                error: Some(error),
            };
        }
    }

    ExecutionOutcome {
        results,
        error: None,
    }
}

fn run_serial(stage: &Stage, ctx: &ExecutionContext, listener: &Listener) -> StageRun {
    let mut slots = Vec::with_capacity(stage.task_count());

    for (task_id, task) in stage.tasks().iter().enumerate() {
        if let Some(reason) = listener.finished() {
            return StageRun {
                slots,
                error: None,
                interrupted: Some(reason),
            };
        }

        log::trace!("Dispatching serial task {} on {}", task_id, task.executor_name());
        task.dispatch(ctx, listener.sink(task_id));

        match listener.next(ctx) {
            Ok((_, Ok(()))) => slots.push(None),
            Ok((_, Err(error))) => {
                slots.push(Some(error.clone()));
                return StageRun {
                    slots,
                    error: Some(error),
                    interrupted: None,
                };
            }
            Err(reason) => {
                slots.push(Some(TaskError::Interrupted(reason)));
                return StageRun {
                    slots,
                    error: None,
                    interrupted: Some(reason),
                };
            }
        }
    }

    StageRun {
        slots,
        error: None,
        interrupted: None,
    }
}

fn run_parallel(stage: &Stage, ctx: &ExecutionContext, listener: &Listener) -> StageRun {
    for (task_id, task) in stage.tasks().iter().enumerate() {
        log::trace!("Dispatching parallel task {} on {}", task_id, task.executor_name());
        task.dispatch(ctx, listener.sink(task_id));
    }

    // Outer `None` means the outcome has not arrived yet.
    let mut pending: Vec<Option<Option<TaskError>>> = vec![None; stage.task_count()];
    let mut received = 0;

    while received < pending.len() {
        match listener.next(ctx) {
            Ok((task_id, outcome)) => {
                if let Some(slot) = pending.get_mut(task_id) {
                    *slot = Some(outcome.err());
                    received += 1;
                }
            }
            Err(reason) => {
                let slots = pending
                    .into_iter()
                    .map(|slot| slot.unwrap_or(Some(TaskError::Interrupted(reason))))
                    .collect();
                return StageRun {
                    slots,
                    error: None,
                    interrupted: Some(reason),
                };
            }
        }
    }

    let slots: Vec<Option<TaskError>> = pending.into_iter().flatten().collect();
    let error = TaskError::chain(slots.iter().flatten().cloned().collect());

    StageRun {
        slots,
        error,
        interrupted: None,
    }
}
