// Fri Oct 16 2026 - Alex

use super::worker::{PoolCounters, PoolWorker, QueuedJob};
use super::{Job, TaskExecutor};
use crate::context::ExecutionContext;
use crate::error::{ConfigError, EngineError};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Arc;
use std::thread;

const SHUT_DOWN: &str = "pool executor is shut down";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub queue_capacity: usize,
    pub submitted: usize,
    pub completed: usize,
    pub unrecovered_panics: usize,
}

impl PoolStats {
    /// Jobs submitted but not yet finished, queued or running.
    pub fn in_flight(&self) -> usize {
        self.submitted.saturating_sub(self.completed)
    }
}

struct PoolInner {
    queue: RwLock<Option<SyncSender<QueuedJob>>>,
    workers: Mutex<Vec<PoolWorker>>,
    counters: Arc<PoolCounters>,
    worker_count: usize,
    queue_capacity: usize,
}

/// A fixed set of worker threads draining a bounded queue.
///
/// Submitting blocks while the queue is full. A capacity of 0 makes every
/// submission a direct hand-off to an idle worker. Handles are cheap to clone and
/// share one pool. [`PoolExecutor::shutdown`] stops accepting work, lets the
/// workers drain what is queued, and joins them; dropping the last handle
/// closes the queue the same way without joining.
#[derive(Clone)]
pub struct PoolExecutor {
    inner: Arc<PoolInner>,
}

impl PoolExecutor {
    pub fn new(worker_count: usize, queue_capacity: usize) -> Result<Self, EngineError> {
        if worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount { value: worker_count }.into());
        }

        let (sender, receiver) = sync_channel(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(PoolCounters::default());

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            // Started workers exit on their own once `sender` is dropped.
            let worker = PoolWorker::start(id, receiver.clone(), counters.clone())?;
            workers.push(worker);
        }

        log::debug!(
            "Started pool executor with {} workers and queue capacity {}",
            worker_count,
            queue_capacity
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                queue: RwLock::new(Some(sender)),
                workers: Mutex::new(workers),
                counters,
                worker_count,
                queue_capacity,
            }),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.inner.worker_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.inner.queue_capacity
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.queue.read().is_none()
    }

    pub fn stats(&self) -> PoolStats {
        let counters = &self.inner.counters;
        PoolStats {
            workers: self.inner.worker_count,
            queue_capacity: self.inner.queue_capacity,
            submitted: counters.submitted.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            unrecovered_panics: counters.unrecovered_panics.load(Ordering::Relaxed),
        }
    }

    /// Closes the queue and waits for the workers to finish queued jobs.
    /// Called from one of this pool's own workers it only closes the queue.
    pub fn shutdown(&self) {
        self.inner.queue.write().take();

        let workers = std::mem::take(&mut *self.inner.workers.lock());
        let current = thread::current().id();
        for worker in workers {
            if worker.thread_id() == Some(current) {
                continue;
            }
            log::trace!("Joining pool worker {}", worker.id());
            worker.join();
        }
        log::debug!("Pool executor shut down");
    }

    pub fn running_workers(&self) -> usize {
        self.inner.workers.lock().iter().filter(|w| w.is_running()).count()
    }
}

impl TaskExecutor for PoolExecutor {
    fn execute(&self, ctx: &ExecutionContext, job: Job) {
        // Clone the sender out so a blocked send does not hold the lock.
        let sender = self.inner.queue.read().clone();
        let Some(sender) = sender else {
            job.abandon(SHUT_DOWN);
            return;
        };

        log::trace!("Queueing task {} on pool", job.task_id());
        self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let queued = QueuedJob {
            ctx: ctx.clone(),
            job,
        };
        if let Err(rejected) = sender.send(queued) {
            self.inner.counters.completed.fetch_add(1, Ordering::Relaxed);
            rejected.0.job.abandon(SHUT_DOWN);
        }
    }

    fn name(&self) -> &str {
        "pool"
    }
}

impl fmt::Debug for PoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolExecutor")
            .field("stats", &self.stats())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{execute_parallel, execute_serial};
    use crate::executor::{Delivery, ResultSink};
    use crate::task::Task;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn test_rejects_zero_workers() {
        assert!(matches!(
            PoolExecutor::new(0, 4),
            Err(EngineError::Config(ConfigError::InvalidWorkerCount { value: 0 }))
        ));
    }

    #[test]
    fn test_zero_capacity_hands_off_directly() {
        let pool = PoolExecutor::new(2, 0).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let tasks = (0..5).map(|_| {
            let count = count.clone();
            Task::pool(
                move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                &pool,
            )
        });

        let outcome = execute_parallel(tasks).wait(&ExecutionContext::background());
        assert!(outcome.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 5);
        pool.shutdown();
        assert_eq!(pool.stats().in_flight(), 0);
    }

    #[test]
    fn test_recovered_panic_with_span() {
        let pool = PoolExecutor::new(2, 2).unwrap();
        let span_seen = Arc::new(Mutex::new(None));
        let record = span_seen.clone();

        let task = Task::pool(
            move |ctx| {
                *record.lock() = ctx.span_name().map(str::to_string);
                panic!("test panic")
            },
            &pool,
        )
        .recover_from_panic()
        .with_observability_hook("test");

        let outcome = execute_serial([task]).wait(&ExecutionContext::background());
        let err = outcome.error.unwrap();
        assert!(err.is_panic());
        assert!(!err.to_string().is_empty());
        assert_eq!(span_seen.lock().as_deref(), Some("test"));
        pool.shutdown();
    }

    #[test]
    fn test_worker_survives_unrecovered_panic() {
        let pool = PoolExecutor::new(1, 4).unwrap();

        let first = execute_serial([Task::pool(|_| panic!("no recovery"), &pool)])
            .wait(&ExecutionContext::background());
        assert!(first.error.unwrap().is_abandoned());

        let second = execute_serial([Task::pool(|_| Ok(()), &pool)])
            .wait(&ExecutionContext::background());
        assert!(second.is_ok());
        assert_eq!(pool.stats().unrecovered_panics, 1);
        pool.shutdown();
    }

    #[test]
    fn test_workers_bound_concurrency() {
        let pool = PoolExecutor::new(2, 8).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..6).map(|_| {
            let running = running.clone();
            let peak = peak.clone();
            Task::pool(
                move |_| {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(30));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                },
                &pool,
            )
        });

        let outcome = execute_parallel(tasks).wait(&ExecutionContext::background());
        assert!(outcome.is_ok());
        assert!(peak.load(Ordering::SeqCst) <= 2);
        pool.shutdown();
        assert_eq!(pool.stats().completed, 6);
    }

    #[test]
    fn test_full_queue_blocks_submission() {
        let pool = PoolExecutor::new(1, 1).unwrap();
        let (release, gate) = channel::<()>();
        let gate = Arc::new(Mutex::new(gate));
        let task = Task::pool(
            move |_| {
                // Returns once the sender is dropped.
                let _ = gate.lock().recv();
                Ok(())
            },
            &pool,
        );

        let (tx, rx) = channel();
        let dispatched = Arc::new(AtomicUsize::new(0));
        let submitter = {
            let dispatched = dispatched.clone();
            thread::spawn(move || {
                let ctx = ExecutionContext::background();
                for task_id in 0..3 {
                    task.dispatch(&ctx, ResultSink::new(task_id, tx.clone()));
                    dispatched.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        // One job held by the worker, one in the queue, the third send blocked.
        thread::sleep(Duration::from_millis(150));
        assert_eq!(dispatched.load(Ordering::SeqCst), 2);
        assert!(!submitter.is_finished());
        assert_eq!(pool.stats().in_flight(), 3);

        drop(release);
        submitter.join().unwrap();
        assert_eq!(dispatched.load(Ordering::SeqCst), 3);

        for _ in 0..3 {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                Delivery::Outcome { outcome, .. } => assert!(outcome.is_ok()),
                Delivery::Done(reason) => panic!("unexpected {:?}", reason),
            }
        }
        pool.shutdown();
        assert_eq!(pool.stats().in_flight(), 0);
    }

    #[test]
    fn test_submit_after_shutdown_is_abandoned() {
        let pool = PoolExecutor::new(2, 2).unwrap();
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert_eq!(pool.running_workers(), 0);

        let outcome = execute_serial([Task::pool(|_| Ok(()), &pool)])
            .wait(&ExecutionContext::background());
        assert!(outcome.error.unwrap().is_abandoned());
    }

    #[test]
    fn test_shared_between_executions() {
        let pool = PoolExecutor::new(3, 3).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        let make = |pool: &PoolExecutor| {
            let count = count.clone();
            Task::pool(
                move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                pool,
            )
        };

        let a = execute_parallel([make(&pool), make(&pool)]);
        let b = execute_serial([make(&pool), make(&pool)]);
        let other = pool.clone();
        let handle = thread::spawn(move || a.wait(&ExecutionContext::background()));
        assert!(b.wait(&ExecutionContext::background()).is_ok());
        assert!(handle.join().unwrap().is_ok());

        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(other.stats().submitted, 4);
        pool.shutdown();
    }
}
