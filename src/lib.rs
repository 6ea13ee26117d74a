// Fri Oct 16 2026 - Alex

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod runtime;
pub mod task;

pub use config::EngineConfig;
pub use context::{CancelHandle, ExecutionContext};
pub use engine::{
    execute_parallel, execute_serial, switch, Case, Execution, ExecutionHandle, ExecutionOutcome,
    ExecutionResults, Stage, StageMode,
};
pub use error::{ConfigError, ContextError, EngineError, TaskError};
pub use executor::{ImmediateExecutor, PoolExecutor, PoolStats, SpawnExecutor, TaskExecutor};
pub use runtime::Runtime;
pub use task::{Task, TaskOptions, TaskOutcome};
