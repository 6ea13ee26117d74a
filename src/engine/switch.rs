// Fri Oct 16 2026 - Alex

use super::execution::Execution;
use std::fmt;

/// One alternative for [`switch`]: an execution guarded by a predicate that
/// is only evaluated if every earlier case declined.
pub struct Case<'a> {
    predicate: Box<dyn FnOnce() -> bool + 'a>,
    execution: Execution,
}

impl<'a> Case<'a> {
    pub fn new<P>(predicate: P, execution: Execution) -> Self
    where
        P: FnOnce() -> bool + 'a,
    {
        Self {
            predicate: Box::new(predicate),
            execution,
        }
    }

    /// A case that always matches.
    pub fn always(execution: Execution) -> Self {
        Self::new(|| true, execution)
    }

    pub fn execution(&self) -> &Execution {
        &self.execution
    }
}

impl fmt::Debug for Case<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Case")
            .field("stages", &self.execution.stage_count())
            .finish_non_exhaustive()
    }
}

/// Picks the execution of the first case whose predicate holds, or
/// `default` when none does. Nothing is run; later predicates are never
/// called once one matches.
pub fn switch<'a, I>(default: Execution, cases: I) -> Execution
where
    I: IntoIterator<Item = Case<'a>>,
{
    for (index, case) in cases.into_iter().enumerate() {
        if (case.predicate)() {
            log::debug!("Switch selected case {}", index);
            return case.execution;
        }
    }

    log::debug!("Switch fell through to the default execution");
    default
}
