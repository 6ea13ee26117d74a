// Fri Oct 16 2026 - Alex

mod driver;
pub mod execution;
pub mod result;
pub mod runner;
pub mod stage;
pub mod switch;

pub use execution::{execute_parallel, execute_serial, Execution};
pub use result::{ExecutionOutcome, ExecutionResults};
pub use runner::ExecutionHandle;
pub use stage::{Stage, StageMode};
pub use switch::{switch, Case};
