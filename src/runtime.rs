// Fri Oct 16 2026 - Alex

//! One configured pool plus the task defaults that go with it.

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::executor::{PoolExecutor, PoolStats};
use crate::task::{Task, TaskOutcome};

#[derive(Debug)]
pub struct Runtime {
    config: EngineConfig,
    pool: PoolExecutor,
}

impl Runtime {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let pool = PoolExecutor::new(config.pool_workers, config.pool_queue_capacity)?;
        log::info!(
            "Runtime ready: {} pool workers, queue capacity {}",
            config.pool_workers,
            config.pool_queue_capacity
        );
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &PoolExecutor {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn immediate<F>(&self, name: &str, work: F) -> Task
    where
        F: Fn(&ExecutionContext) -> TaskOutcome + Send + Sync + 'static,
    {
        self.configure(Task::immediate(work), name)
    }

    pub fn spawned<F>(&self, name: &str, work: F) -> Task
    where
        F: Fn(&ExecutionContext) -> TaskOutcome + Send + Sync + 'static,
    {
        self.configure(Task::spawned(work), name)
    }

    pub fn pooled<F>(&self, name: &str, work: F) -> Task
    where
        F: Fn(&ExecutionContext) -> TaskOutcome + Send + Sync + 'static,
    {
        self.configure(Task::pool(work, &self.pool), name)
    }

    fn configure(&self, task: Task, name: &str) -> Task {
        let mut task = task.with_name(name);
        if self.config.recover_from_panic {
            task = task.recover_from_panic();
        }
        if self.config.span_prefix.is_some() {
            task = task.with_observability_hook(self.config.span_name(name));
        }
        task
    }

    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}
