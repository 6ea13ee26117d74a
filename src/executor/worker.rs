// Fri Oct 16 2026 - Alex

use super::Job;
use crate::context::ExecutionContext;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

pub(crate) struct QueuedJob {
    pub ctx: ExecutionContext,
    pub job: Job,
}

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted: AtomicUsize,
    pub completed: AtomicUsize,
    pub unrecovered_panics: AtomicUsize,
}

/// One long-lived pool thread. It drains the shared queue until every
/// sender is gone.
pub(crate) struct PoolWorker {
    id: usize,
    thread_handle: Option<JoinHandle<()>>,
}

impl PoolWorker {
    pub fn start(
        id: usize,
        queue: Arc<Mutex<Receiver<QueuedJob>>>,
        counters: Arc<PoolCounters>,
    ) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("koncurrent-pool-{}", id))
            .spawn(move || PoolWorker::worker_loop(id, queue, counters))?;

        Ok(Self {
            id,
            thread_handle: Some(handle),
        })
    }

    fn worker_loop(id: usize, queue: Arc<Mutex<Receiver<QueuedJob>>>, counters: Arc<PoolCounters>) {
        log::debug!("Pool worker {} started", id);

        loop {
            let next = {
                let queue = queue.lock();
                queue.recv()
            };

            let Ok(QueuedJob { ctx, job }) = next else {
                break;
            };

            let task_id = job.task_id();
            // Work without panic recovery still must not take the worker down.
            if catch_unwind(AssertUnwindSafe(|| job.run(&ctx))).is_err() {
                counters.unrecovered_panics.fetch_add(1, Ordering::Relaxed);
                log::error!("Pool worker {} caught an unrecovered panic from task {}", id, task_id);
            }
            counters.completed.fetch_add(1, Ordering::Relaxed);
        }

        log::debug!("Pool worker {} stopped", id);
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn thread_id(&self) -> Option<ThreadId> {
        self.thread_handle.as_ref().map(|h| h.thread().id())
    }

    pub fn join(mut self) {
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}
