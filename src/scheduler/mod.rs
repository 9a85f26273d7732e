//! Update scheduling.
//!
//! The machinery between signal writes and component renders:
//!
//! - [`queue`] - single-threaded microtask queue with explicit drain
//! - [`deferred`] - promise-like handles for settled updates
//! - [`batcher`] - the process-wide watcher coalescing reactions per turn
//! - [`effect`] - callback bindings re-run on signal change
//!
//! # Data flow
//!
//! ```text
//! signal write → batcher wakes (once per turn) → flush refreshes pending
//! computeds → effect callbacks re-run → update pipelines render → settle
//! ```

pub mod batcher;
pub mod deferred;
pub mod effect;
pub mod queue;

pub use batcher::{global_batcher, reset_global_batcher, with_global_batcher, Batcher};
pub use deferred::Deferred;
pub use effect::{effect, Cleanup, Effect, WeakHandle};
pub use queue::{drain_microtasks, enqueue_microtask, pending_microtasks};

use std::cell::RefCell;

use crate::errors::UpdateError;

// =============================================================================
// UNHANDLED FAILURES
// =============================================================================
//
// A failed update cycle settles its pipeline and then surfaces here, on a
// microtask, so the failure is observable without breaking the scheduler.
// =============================================================================

thread_local! {
    static UNHANDLED_HOOK: RefCell<Option<Box<dyn Fn(UpdateError)>>> =
        const { RefCell::new(None) };
}

/// Install an observer for update failures that escape their cycle. Replaces
/// any previous observer.
pub fn set_unhandled_error_hook(hook: impl Fn(UpdateError) + 'static) {
    UNHANDLED_HOOK.with(|slot| {
        *slot.borrow_mut() = Some(Box::new(hook));
    });
}

/// Remove the installed observer; failures fall back to being logged.
pub fn clear_unhandled_error_hook() {
    UNHANDLED_HOOK.with(|slot| {
        *slot.borrow_mut() = None;
    });
}

/// Re-raise `error` asynchronously: delivered to the installed observer on
/// the next drain, or logged if none is installed.
pub(crate) fn raise_async(error: UpdateError) {
    enqueue_microtask(move || {
        UNHANDLED_HOOK.with(|slot| match &*slot.borrow() {
            Some(hook) => hook(error),
            None => {
                tracing::error!(error = %error, "unhandled update failure");
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn raised_errors_reach_the_hook_asynchronously() {
        let seen = Rc::new(Cell::new(0));
        {
            let seen = seen.clone();
            set_unhandled_error_hook(move |_| seen.set(seen.get() + 1));
        }

        raise_async(UpdateError {
            phase: "render",
            source: "boom".into(),
        });
        assert_eq!(seen.get(), 0);

        drain_microtasks();
        assert_eq!(seen.get(), 1);

        clear_unhandled_error_hook();
    }

    #[test]
    fn without_a_hook_errors_are_swallowed_into_logs() {
        clear_unhandled_error_hook();
        raise_async(UpdateError {
            phase: "should_update",
            source: "boom".into(),
        });
        // Must not panic.
        drain_microtasks();
    }
}
