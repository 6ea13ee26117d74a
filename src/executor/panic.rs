// Fri Oct 16 2026 - Alex

//! Panic-to-error conversion for tasks that opted into recovery.
//!
//! A process-wide hook records the panic location and a backtrace of the
//! panicking frame while the current thread is inside [`recover`]. Panics
//! outside a recovering section go to the previously installed hook.

use crate::error::TaskError;
use crate::task::TaskOutcome;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

struct Captured {
    location: String,
    stack: String,
}

thread_local! {
    static RECOVERING: Cell<usize> = const { Cell::new(0) };
    static CAPTURED: RefCell<Option<Captured>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if RECOVERING.with(|depth| depth.get()) == 0 {
                previous(info);
                return;
            }

            let location = match info.location() {
                Some(loc) => format!("{}:{}:{}", loc.file(), loc.line(), loc.column()),
                None => "unknown location".to_string(),
            };
            let stack = Backtrace::force_capture().to_string();
            CAPTURED.with(|slot| *slot.borrow_mut() = Some(Captured { location, stack }));
        }));
    });
}

pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Runs `work`, turning a panic into [`TaskError::Panic`].
pub fn recover<F>(work: F) -> TaskOutcome
where
    F: FnOnce() -> TaskOutcome,
{
    install_hook();

    RECOVERING.with(|depth| depth.set(depth.get() + 1));
    let result = panic::catch_unwind(AssertUnwindSafe(work));
    RECOVERING.with(|depth| depth.set(depth.get() - 1));

    match result {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload_message(payload.as_ref());
            let captured = CAPTURED.with(|slot| slot.borrow_mut().take());
            let (location, stack) = match captured {
                Some(c) => (c.location, c.stack),
                None => ("unknown location".to_string(), Backtrace::force_capture().to_string()),
            };
            Err(TaskError::panic(format!("{} at {}", message, location), stack))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recover_passes_through_outcomes() {
        assert!(recover(|| Ok(())).is_ok());
        let err = recover(|| Err(TaskError::msg("plain"))).unwrap_err();
        assert!(!err.is_panic());
    }

    #[test]
    fn test_recover_captures_message_and_location() {
        let err = recover(|| panic!("exploded {}", 42)).unwrap_err();
        match err {
            TaskError::Panic { message, stack } => {
                assert!(message.contains("exploded 42"));
                assert!(message.contains("panic.rs"));
                assert!(!stack.is_empty());
            }
            other => panic!("expected panic error, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_recover() {
        let outer = recover(|| {
            let inner = recover(|| panic!("inner"));
            assert!(inner.unwrap_err().is_panic());
            panic!("outer")
        });
        assert!(outer.unwrap_err().to_string().contains("outer"));
    }

    #[test]
    fn test_payload_message_variants() {
        assert_eq!(payload_message(&"static"), "static");
        assert_eq!(payload_message(&String::from("owned")), "owned");
        assert_eq!(payload_message(&7u32), "Unknown panic");
    }
}
