// ============================================================================
// spark-element - Batcher
// Coalesces all watcher notifications in a turn into one flush microtask
// ============================================================================
//
// Every write in a synchronous segment lands in the same flush:
//
// ```text
// write → watcher notify → needs_enqueue? → enqueue flush (once)
// flush → rearm needs_enqueue → refresh pending nodes → watcher.resume()
// ```
//
// The flush rearms `needs_enqueue` BEFORE refreshing, so a write performed
// during the flush schedules a fresh microtask instead of being lost - and
// instead of recursing into a nested flush on the current call stack.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::signals::node::AnyComputed;
use crate::signals::watcher::Watcher;

use super::queue::enqueue_microtask;

// =============================================================================
// BATCHER
// =============================================================================

struct BatcherInner {
    /// True iff no flush microtask is currently queued.
    needs_enqueue: Cell<bool>,

    /// Set after construction; the watcher's notify closure needs a handle
    /// back to the inner state.
    watcher: RefCell<Option<Watcher>>,

    /// Flush passes performed (diagnostics and tests).
    flushes: Cell<u64>,
}

impl BatcherInner {
    fn watcher(&self) -> Watcher {
        self.watcher
            .borrow()
            .as_ref()
            .expect("batcher watcher initialized at construction")
            .clone()
    }

    fn on_notify(self: &Rc<Self>) {
        if !self.needs_enqueue.replace(false) {
            return;
        }
        let weak = Rc::downgrade(self);
        enqueue_microtask(move || {
            if let Some(inner) = weak.upgrade() {
                inner.flush();
            }
        });
    }

    fn flush(self: &Rc<Self>) {
        // Rearm FIRST: a write occurring while we refresh below must queue a
        // fresh flush rather than vanish into this one.
        self.needs_enqueue.set(true);
        self.flushes.set(self.flushes.get() + 1);

        let watcher = self.watcher();
        let pending = watcher.take_pending();
        tracing::trace!(nodes = pending.len(), "flushing pending reactions");

        for node in pending {
            node.refresh();
        }

        watcher.resume();
    }
}

/// Coalesces signal-driven reactions into one notification pass per turn.
///
/// One process-wide instance drives all effects by default
/// ([`with_global_batcher`]); tests construct isolated instances.
pub struct Batcher {
    inner: Rc<BatcherInner>,
}

impl Clone for Batcher {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Batcher {
    /// Create an isolated batcher with its own watcher.
    pub fn new() -> Self {
        let inner = Rc::new(BatcherInner {
            needs_enqueue: Cell::new(true),
            watcher: RefCell::new(None),
            flushes: Cell::new(0),
        });

        let weak: Weak<BatcherInner> = Rc::downgrade(&inner);
        let watcher = Watcher::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_notify();
            }
        });
        *inner.watcher.borrow_mut() = Some(watcher);

        Self { inner }
    }

    /// Track `node`: its stale transitions now feed this batcher's flushes.
    pub fn watch(&self, node: Rc<dyn AnyComputed>) {
        self.inner.watcher().watch(node);
    }

    /// Stop tracking `node`.
    pub fn unwatch(&self, node: &Rc<dyn AnyComputed>) {
        self.inner.watcher().unwatch(node);
    }

    /// Run a flush pass now, bypassing the queue. Test hook; production
    /// flushes arrive via the microtask queue.
    pub fn flush_now(&self) {
        self.inner.flush();
    }

    /// Number of flush passes performed so far.
    pub fn flush_count(&self) -> u64 {
        self.inner.flushes.get()
    }

    /// Whether a flush microtask is currently queued.
    pub fn flush_scheduled(&self) -> bool {
        !self.inner.needs_enqueue.get()
    }
}

impl Default for Batcher {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// GLOBAL INSTANCE
// =============================================================================

thread_local! {
    static GLOBAL: RefCell<Option<Batcher>> = const { RefCell::new(None) };
}

/// Access the process-wide batcher, creating it on first access. It lives for
/// the life of the process; there is no teardown.
pub fn with_global_batcher<R>(f: impl FnOnce(&Batcher) -> R) -> R {
    // Clone the handle out before calling `f`: the callback may itself reach
    // for the global batcher (e.g. creating an effect from inside a render).
    let batcher = GLOBAL.with(|slot| {
        slot.borrow_mut().get_or_insert_with(Batcher::new).clone()
    });
    f(&batcher)
}

/// A handle to the process-wide batcher.
pub fn global_batcher() -> Batcher {
    with_global_batcher(|b| b.clone())
}

/// Replace the process-wide batcher with a fresh one. Test hook.
pub fn reset_global_batcher() {
    GLOBAL.with(|slot| {
        *slot.borrow_mut() = None;
    });
}

// =============================================================================
// TESTS
// =============================================================================
