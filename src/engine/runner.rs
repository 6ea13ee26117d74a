// Fri Oct 16 2026 - Alex

use super::execution::Execution;
use super::result::ExecutionOutcome;
use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::executor::panic::payload_message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

static NEXT_EXECUTION_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn spawn<F>(
    execution: Execution,
    ctx: ExecutionContext,
    callback: F,
) -> Result<ExecutionHandle, EngineError>
where
    F: FnOnce(ExecutionOutcome) + Send + 'static,
{
    start(move |_| {
        let outcome = execution.wait(&ctx);
        callback(outcome);
    })
}

pub(crate) fn spawn_collecting(
    execution: Execution,
    ctx: ExecutionContext,
) -> Result<ExecutionHandle, EngineError> {
    start(move |tx| {
        let _ = tx.send(execution.wait(&ctx));
    })
}

fn start<F>(body: F) -> Result<ExecutionHandle, EngineError>
where
    F: FnOnce(Sender<ExecutionOutcome>) + Send + 'static,
{
    let id = NEXT_EXECUTION_ID.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = channel();

    let handle = thread::Builder::new()
        .name(format!("koncurrent-execution-{}", id))
        .spawn(move || body(tx))?;
    log::debug!("Started execution thread {}", id);

    Ok(ExecutionHandle {
        thread_handle: Some(handle),
        result_receiver: rx,
    })
}

/// Handle to an execution running on its own thread.
///
/// Dropping the handle detaches the thread; the run and its callback still
/// complete.
pub struct ExecutionHandle {
    thread_handle: Option<JoinHandle<()>>,
    result_receiver: Receiver<ExecutionOutcome>,
}

impl ExecutionHandle {
    /// Blocks until the run, and its callback if any, have returned.
    pub fn join(mut self) -> Result<(), EngineError> {
        self.join_thread()
    }

    /// Blocks until the run finishes and returns its outcome. Only handles
    /// from [`Execution::spawn`] carry an outcome; with a callback the outcome
    /// went to the callback and this reports [`EngineError::NoOutcome`].
    pub fn wait(mut self) -> Result<ExecutionOutcome, EngineError> {
        self.join_thread()?;
        self.result_receiver.recv().map_err(|_| EngineError::NoOutcome)
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<ExecutionOutcome> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    pub fn try_outcome(&self) -> Option<ExecutionOutcome> {
        self.result_receiver.try_recv().ok()
    }

    pub fn is_finished(&self) -> bool {
        self.thread_handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_handle.as_ref().and_then(|h| h.thread().name())
    }

    fn join_thread(&mut self) -> Result<(), EngineError> {
        let Some(handle) = self.thread_handle.take() else {
            return Ok(());
        };
        handle.join().map_err(|payload| {
            let message = payload_message(payload.as_ref());
            log::error!("Execution thread panicked: {}", message);
            EngineError::Panicked(message)
        })
    }
}

impl std::fmt::Debug for ExecutionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionHandle")
            .field("thread", &self.thread_name())
            .field("finished", &self.is_finished())
            .finish()
    }
}
