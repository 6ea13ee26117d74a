// Fri Oct 16 2026 - Alex

use super::{Job, TaskExecutor};
use crate::context::ExecutionContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

static NEXT_THREAD: AtomicU64 = AtomicU64::new(1);

/// Starts one new thread per dispatched task.
#[derive(Debug, Clone, Default)]
pub struct SpawnExecutor {
    stack_size: Option<usize>,
}

impl SpawnExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl TaskExecutor for SpawnExecutor {
    fn execute(&self, ctx: &ExecutionContext, job: Job) {
        let id = NEXT_THREAD.fetch_add(1, Ordering::Relaxed);
        let task_id = job.task_id();
        let ctx = ctx.clone();

        let mut builder = thread::Builder::new().name(format!("koncurrent-task-{}", id));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        // On failure the closure, and with it the job, is dropped, which
        // reports the task as abandoned.
        if let Err(e) = builder.spawn(move || job.run(&ctx)) {
            log::error!("Failed to spawn thread for task {}: {}", task_id, e);
        }
    }

    fn name(&self) -> &str {
        "spawn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{execute_parallel, execute_serial};
    use crate::task::Task;
    use std::time::{Duration, Instant};

    #[test]
    fn test_runs_off_the_calling_thread() {
        let caller = thread::current().id();
        let outcome = execute_serial([Task::spawned(move |_| {
            assert_ne!(thread::current().id(), caller);
            Ok(())
        })
        .recover_from_panic()])
        .wait(&ExecutionContext::background());
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_stack_size_executor_runs_named_thread() {
        let executor = SpawnExecutor::new().with_stack_size(256 * 1024);
        let outcome = execute_serial([Task::immediate(|_| {
            let name = thread::current().name().map(str::to_string);
            assert!(name.is_some_and(|n| n.starts_with("koncurrent-task-")));
            Ok(())
        })
        .with_executor(std::sync::Arc::new(executor))])
        .wait(&ExecutionContext::background());
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_dispatch_does_not_block() {
        let start = Instant::now();
        let outcome = execute_parallel((0..4).map(|_| {
            Task::spawned(|_| {
                thread::sleep(Duration::from_millis(200));
                Ok(())
            })
        }))
        .wait(&ExecutionContext::background());

        assert!(outcome.is_ok());
        assert!(start.elapsed() < Duration::from_millis(700));
    }

    #[test]
    fn test_panic_is_isolated_to_its_thread() {
        let outcome = execute_parallel([
            Task::spawned(|_| panic!("test panic")).recover_from_panic(),
            Task::spawned(|_| Ok(())),
        ])
        .wait(&ExecutionContext::background());

        assert!(outcome.results.stage(0)[0].as_ref().unwrap().is_panic());
        assert!(outcome.results.stage(0)[1].is_none());
    }

    #[test]
    fn test_unrecovered_panic_still_reports() {
        let outcome = execute_serial([Task::spawned(|_| panic!("no recovery"))])
            .wait(&ExecutionContext::background());
        assert!(outcome.error.unwrap().is_abandoned());
    }
}
