// Fri Oct 16 2026 - Alex

use super::{Job, TaskExecutor};
use crate::context::ExecutionContext;

/// Runs work inline on the dispatching thread. Without panic recovery a
/// panicking task unwinds straight into the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateExecutor;

impl TaskExecutor for ImmediateExecutor {
    fn execute(&self, ctx: &ExecutionContext, job: Job) {
        log::trace!("Running task {} inline", job.task_id());
        job.run(ctx);
    }

    fn name(&self) -> &str {
        "immediate"
    }
}
