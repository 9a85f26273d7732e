// ============================================================================
// spark-element - Microtask Queue
// Single-threaded task queue with an explicit, deterministic drain
// ============================================================================
//
// The scheduler defers work to "microtasks": closures run in FIFO order when
// the embedding environment drains the queue. Tasks enqueued while draining
// run in the same drain, after everything already queued - which is what
// makes rearm-before-process batching observable and testable.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

type Task = Box<dyn FnOnce()>;

/// Iteration cap for a single drain. A cycle of tasks that keep re-enqueueing
/// each other would otherwise spin forever.
const MAX_DRAIN_TASKS: usize = 10_000;

thread_local! {
    static QUEUE: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// Queue a closure to run on the next drain.
pub fn enqueue_microtask(task: impl FnOnce() + 'static) {
    QUEUE.with(|queue| queue.borrow_mut().push_back(Box::new(task)));
}

/// Number of queued tasks not yet run.
pub fn pending_microtasks() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

/// Run queued tasks in FIFO order until the queue is empty.
///
/// Re-entrant calls return immediately; the outermost drain picks up
/// whatever the nested caller expected to run. Panics after
/// `MAX_DRAIN_TASKS` tasks in one drain, which indicates an update cycle
/// that keeps scheduling itself.
pub fn drain_microtasks() {
    if DRAINING.with(|d| d.replace(true)) {
        return;
    }

    struct DrainGuard;

    impl Drop for DrainGuard {
        fn drop(&mut self) {
            DRAINING.with(|d| d.set(false));
        }
    }

    let _guard = DrainGuard;

    let mut processed = 0usize;
    loop {
        let task = QUEUE.with(|queue| queue.borrow_mut().pop_front());
        let Some(task) = task else {
            break;
        };

        processed += 1;
        if processed > MAX_DRAIN_TASKS {
            panic!(
                "Maximum update depth exceeded. This can happen when an update \
                 cycle continuously schedules itself. Check for effects or \
                 hooks that write to values they depend on without guards."
            );
        }

        task();
    }
}

// =============================================================================
// TESTS
// =============================================================================
