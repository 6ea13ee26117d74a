// Fri Oct 16 2026 - Alex

//! Cancellable execution context handed to every task and raced against by
//! the stage driver.
//!
//! Contexts form a tree: cancelling a context cancels every context derived
//! from it, and a derived deadline never outlives its parent's. Cancellation
//! is purely advisory for running work; a task body has to check
//! [`ExecutionContext::is_done`] (or use [`ExecutionContext::sleep`]) to stop
//! early.

use crate::error::ContextError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

type Waiter = Box<dyn FnOnce(ContextError) + Send>;

struct Waiters {
    reason: Option<ContextError>,
    next_id: u64,
    pending: HashMap<u64, Waiter>,
}

struct ContextState {
    deadline: Option<Instant>,
    waiters: Mutex<Waiters>,
    parent: Option<(Arc<ContextState>, u64)>,
}

impl ContextState {
    fn new(deadline: Option<Instant>) -> Self {
        Self {
            deadline,
            waiters: Mutex::new(Waiters {
                reason: None,
                next_id: 0,
                pending: HashMap::new(),
            }),
            parent: None,
        }
    }

    fn reason(&self) -> Option<ContextError> {
        self.waiters.lock().reason
    }

    /// Registers `waiter`, or runs it right away when already cancelled.
    fn register(&self, waiter: Waiter) -> Option<u64> {
        let mut waiters = self.waiters.lock();
        if let Some(reason) = waiters.reason {
            drop(waiters);
            waiter(reason);
            return None;
        }
        let id = waiters.next_id;
        waiters.next_id += 1;
        waiters.pending.insert(id, waiter);
        Some(id)
    }

    fn unregister(&self, id: u64) {
        self.waiters.lock().pending.remove(&id);
    }

    fn cancel(&self, reason: ContextError) {
        let pending = {
            let mut waiters = self.waiters.lock();
            if waiters.reason.is_some() {
                return;
            }
            waiters.reason = Some(reason);
            std::mem::take(&mut waiters.pending)
        };

        for (_, waiter) in pending {
            waiter(reason);
        }
    }
}

impl Drop for ContextState {
    fn drop(&mut self) {
        if let Some((parent, id)) = self.parent.take() {
            parent.unregister(id);
        }
    }
}

#[derive(Clone)]
struct TaskSpan {
    name: Arc<str>,
    span: tracing::Span,
}

#[derive(Clone)]
pub struct ExecutionContext {
    state: Arc<ContextState>,
    span: Option<TaskSpan>,
}

impl ExecutionContext {
    /// A root context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            state: Arc::new(ContextState::new(None)),
            span: None,
        }
    }

    pub fn with_cancel(&self) -> (ExecutionContext, CancelHandle) {
        let child = self.derive(self.deadline());
        let handle = CancelHandle {
            state: child.state.clone(),
        };
        (child, handle)
    }

    pub fn with_timeout(&self, timeout: Duration) -> ExecutionContext {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> ExecutionContext {
        let effective = match self.deadline() {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        self.derive(Some(effective))
    }

    fn derive(&self, deadline: Option<Instant>) -> ExecutionContext {
        let mut state = ContextState::new(deadline);

        // Registering needs the child's address, so link through a slot that
        // is filled once the child is allocated. A cancel that lands before
        // the slot is filled is parked in the slot instead.
        let slot: Arc<Mutex<(Weak<ContextState>, Option<ContextError>)>> =
            Arc::new(Mutex::new((Weak::new(), None)));
        let link = slot.clone();
        let id = self.state.register(Box::new(move |reason| {
            let mut link = link.lock();
            match link.0.upgrade() {
                Some(child) => {
                    drop(link);
                    child.cancel(reason);
                }
                None => link.1 = Some(reason),
            }
        }));

        if let Some(id) = id {
            state.parent = Some((self.state.clone(), id));
        }
        let state = Arc::new(state);

        let parked = {
            let mut slot = slot.lock();
            slot.0 = Arc::downgrade(&state);
            slot.1.take()
        };
        if let Some(reason) = parked {
            state.cancel(reason);
        }

        ExecutionContext {
            state,
            span: self.span.clone(),
        }
    }

    /// Same cancellation scope, with an observability span attached.
    pub fn with_span(&self, name: &str, span: tracing::Span) -> ExecutionContext {
        ExecutionContext {
            state: self.state.clone(),
            span: Some(TaskSpan {
                name: Arc::from(name),
                span,
            }),
        }
    }

    pub fn span(&self) -> Option<&tracing::Span> {
        self.span.as_ref().map(|s| &s.span)
    }

    pub fn span_name(&self) -> Option<&str> {
        self.span.as_ref().map(|s| s.name.as_ref())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.state.deadline
    }

    pub fn err(&self) -> Option<ContextError> {
        if let Some(reason) = self.state.reason() {
            return Some(reason);
        }
        match self.state.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Calls `f` once when this context is cancelled. Deadlines do not fire
    /// it; callers waiting on a deadline use [`ExecutionContext::deadline`].
    /// Dropping the guard unregisters `f`.
    pub fn on_done<F>(&self, f: F) -> DoneGuard
    where
        F: FnOnce(ContextError) + Send + 'static,
    {
        let id = self.state.register(Box::new(f));
        DoneGuard {
            state: self.state.clone(),
            id,
        }
    }

    /// Sleeps for `duration`, waking early when the context finishes.
    pub fn sleep(&self, duration: Duration) -> Result<(), ContextError> {
        let (tx, rx) = mpsc::channel();
        let _guard = self.on_done(move |reason| {
            let _ = tx.send(reason);
        });

        let mut wake_at = Instant::now() + duration;
        let mut deadline_first = false;
        if let Some(deadline) = self.deadline() {
            if deadline <= wake_at {
                wake_at = deadline;
                deadline_first = true;
            }
        }

        match rx.recv_timeout(wake_at.saturating_duration_since(Instant::now())) {
            Ok(reason) => Err(reason),
            Err(_) if deadline_first => Err(ContextError::DeadlineExceeded),
            Err(_) => Ok(()),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("deadline", &self.state.deadline)
            .field("err", &self.err())
            .field("span", &self.span_name())
            .finish()
    }
}

#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<ContextState>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.state.cancel(ContextError::Cancelled);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.reason().is_some()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub struct DoneGuard {
    state: Arc<ContextState>,
    id: Option<u64>,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.state.unregister(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_background_never_done() {
        let ctx = ExecutionContext::background();
        assert!(!ctx.is_done());
        assert!(ctx.deadline().is_none());
        assert!(ctx.sleep(Duration::from_millis(5)).is_ok());
    }

    #[test]
    fn test_cancel_reaches_children_not_parent() {
        let root = ExecutionContext::background();
        let (parent, cancel_parent) = root.with_cancel();
        let (child, cancel_child) = parent.with_cancel();
        let grandchild = child.with_timeout(Duration::from_secs(60));

        cancel_child.cancel();
        assert_eq!(child.err(), Some(ContextError::Cancelled));
        assert_eq!(grandchild.err(), Some(ContextError::Cancelled));
        assert!(!parent.is_done());

        let (sibling, _) = parent.with_cancel();
        cancel_parent.cancel();
        assert!(sibling.is_done());
        assert!(parent.is_done());
        assert!(!root.is_done());
    }

    #[test]
    fn test_child_of_cancelled_parent_starts_cancelled() {
        let (parent, cancel) = ExecutionContext::background().with_cancel();
        cancel.cancel();
        let (child, _) = parent.with_cancel();
        assert_eq!(child.err(), Some(ContextError::Cancelled));
    }

    #[test]
    fn test_deadline_is_capped_by_parent() {
        let parent = ExecutionContext::background().with_timeout(Duration::from_millis(20));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        thread::sleep(Duration::from_millis(30));
        assert_eq!(child.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn test_on_done_fires_once_and_guard_unregisters() {
        let (ctx, cancel) = ExecutionContext::background().with_cancel();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let _kept = ctx.on_done(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = hits.clone();
        let dropped = ctx.on_done(move |_| {
            counter.fetch_add(10, Ordering::SeqCst);
        });
        drop(dropped);

        cancel.cancel();
        cancel.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sleep_wakes_on_cancel() {
        let (ctx, cancel) = ExecutionContext::background().with_cancel();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            cancel.cancel();
        });

        let start = Instant::now();
        assert_eq!(ctx.sleep(Duration::from_secs(5)), Err(ContextError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_sleep_stops_at_deadline() {
        let ctx = ExecutionContext::background().with_timeout(Duration::from_millis(20));
        assert_eq!(
            ctx.sleep(Duration::from_secs(5)),
            Err(ContextError::DeadlineExceeded)
        );
    }

    #[test]
    fn test_span_is_forwarded() {
        let ctx = ExecutionContext::background().with_span("load", tracing::Span::none());
        assert_eq!(ctx.span_name(), Some("load"));
        let (child, _) = ctx.with_cancel();
        assert_eq!(child.span_name(), Some("load"));
    }
}
