// ============================================================================
// spark-element - Watcher
// A tracking set over computed nodes with once-per-turn stale notification
// ============================================================================
//
// A watcher tracks a set of computeds and collects the ones whose
// dependencies changed ("pending"). The notify callback fires on the FIRST
// node going pending and then stays quiet until `resume()` re-arms it, so a
// burst of writes produces exactly one notification.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::node::{ptr_id, AnyComputed};

// =============================================================================
// WATCHER INNER
// =============================================================================

/// Shared watcher state. Computeds hold `Weak<WatcherInner>` back-references.
pub struct WatcherInner {
    /// Nodes this watcher tracks (strong: watching keeps a node alive).
    watched: RefCell<Vec<Rc<dyn AnyComputed>>>,

    /// Watched nodes that went stale since the last drain.
    pending: RefCell<Vec<Rc<dyn AnyComputed>>>,

    /// Whether the next pending transition fires the notify callback.
    armed: Cell<bool>,

    notify: RefCell<Box<dyn FnMut()>>,
}

impl WatcherInner {
    /// Called by a watched node on its clean→stale transition.
    pub(crate) fn node_went_stale(&self, node: Rc<dyn AnyComputed>) {
        {
            let mut pending = self.pending.borrow_mut();
            let id = ptr_id(&node);
            if pending.iter().any(|n| ptr_id(n) == id) {
                return;
            }
            pending.push(node);
        }

        if self.armed.replace(false) {
            let mut notify = self.notify.borrow_mut();
            (*notify)();
        }
    }
}

// =============================================================================
// WATCHER
// =============================================================================

/// Tracks computed nodes and reports which have gone stale.
pub struct Watcher {
    inner: Rc<WatcherInner>,
}

impl Clone for Watcher {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Watcher {
    /// Create a watcher. `notify` fires at most once per armed period, on the
    /// first watched node going stale.
    pub fn new(notify: impl FnMut() + 'static) -> Self {
        Self {
            inner: Rc::new(WatcherInner {
                watched: RefCell::new(Vec::new()),
                pending: RefCell::new(Vec::new()),
                armed: Cell::new(true),
                notify: RefCell::new(Box::new(notify)),
            }),
        }
    }

    /// Start tracking `node`. Watching an already-watched node is a no-op.
    pub fn watch(&self, node: Rc<dyn AnyComputed>) {
        {
            let mut watched = self.inner.watched.borrow_mut();
            let id = ptr_id(&node);
            if watched.iter().any(|n| ptr_id(n) == id) {
                return;
            }
            watched.push(node.clone());
        }
        node.attach_watcher(Rc::downgrade(&self.inner));

        // A node that is already stale counts as pending immediately.
        if node.is_stale() {
            self.inner.node_went_stale(node);
        }
    }

    /// Stop tracking `node`, forgetting any pending report for it.
    pub fn unwatch(&self, node: &Rc<dyn AnyComputed>) {
        let id = ptr_id(node);
        self.inner.watched.borrow_mut().retain(|n| ptr_id(n) != id);
        self.inner.pending.borrow_mut().retain(|n| ptr_id(n) != id);
        node.detach_watcher(&self.inner);
    }

    /// Drain and return the nodes that went stale since the last drain.
    pub fn take_pending(&self) -> Vec<Rc<dyn AnyComputed>> {
        self.inner.pending.take()
    }

    /// Re-arm notification after processing a drain. If nodes went stale
    /// while processing, the callback fires again right away instead of those
    /// reports being lost.
    pub fn resume(&self) {
        if self.inner.pending.borrow().is_empty() {
            self.inner.armed.set(true);
            return;
        }
        self.inner.armed.set(false);
        let mut notify = self.inner.notify.borrow_mut();
        (*notify)();
    }

    /// Number of currently watched nodes.
    pub fn watched_count(&self) -> usize {
        self.inner.watched.borrow().len()
    }

    /// Whether any watched node is waiting to be processed.
    pub fn has_pending(&self) -> bool {
        !self.inner.pending.borrow().is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::computed::computed;
    use crate::signals::source::signal;
    use std::cell::Cell;

    #[test]
    fn notify_fires_once_per_armed_period() {
        let fired = Rc::new(Cell::new(0));

        let count = signal(0);
        let tracker = {
            let count = count.clone();
            computed(move || count.get())
        };
        tracker.get();

        let watcher = {
            let fired = fired.clone();
            Watcher::new(move || fired.set(fired.get() + 1))
        };
        watcher.watch(tracker.as_any_computed());

        count.set(1);
        assert_eq!(fired.get(), 1);

        // Further writes while un-resumed stay quiet.
        count.set(2);
        count.set(3);
        assert_eq!(fired.get(), 1);

        let pending = watcher.take_pending();
        assert_eq!(pending.len(), 1);
        for node in &pending {
            node.refresh();
        }
        watcher.resume();

        count.set(4);
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn watching_an_already_stale_node_reports_it() {
        let fired = Rc::new(Cell::new(0));

        let count = signal(0);
        let tracker = {
            let count = count.clone();
            computed(move || count.get())
        };
        tracker.get();
        count.set(1); // stale before anyone watches

        let watcher = {
            let fired = fired.clone();
            Watcher::new(move || fired.set(fired.get() + 1))
        };
        watcher.watch(tracker.as_any_computed());

        assert_eq!(fired.get(), 1);
        assert!(watcher.has_pending());
    }

    #[test]
    fn unwatch_forgets_pending_reports() {
        let count = signal(0);
        let tracker = {
            let count = count.clone();
            computed(move || count.get())
        };
        tracker.get();

        let watcher = Watcher::new(|| {});
        watcher.watch(tracker.as_any_computed());
        assert_eq!(watcher.watched_count(), 1);

        count.set(1);
        assert!(watcher.has_pending());

        watcher.unwatch(&tracker.as_any_computed());
        assert_eq!(watcher.watched_count(), 0);
        assert!(!watcher.has_pending());

        // Detached: later writes no longer reach this watcher.
        count.set(2);
        assert!(!watcher.has_pending());
    }

    #[test]
    fn resume_refires_for_reports_raced_during_drain() {
        let fired = Rc::new(Cell::new(0));

        let count = signal(0);
        let tracker = {
            let count = count.clone();
            computed(move || count.get())
        };
        tracker.get();

        let watcher = {
            let fired = fired.clone();
            Watcher::new(move || fired.set(fired.get() + 1))
        };
        watcher.watch(tracker.as_any_computed());

        count.set(1);
        assert_eq!(fired.get(), 1);

        // Drain, then dirty the node again BEFORE resuming - as a write
        // during flush would.
        let pending = watcher.take_pending();
        for node in &pending {
            node.refresh();
        }
        count.set(2);

        watcher.resume();
        // The raced report re-fires notify instead of being dropped.
        assert_eq!(fired.get(), 2);
        assert!(watcher.has_pending());
    }

    #[test]
    fn pending_reports_deduplicate() {
        let count = signal(0);
        let other = signal(0);
        let tracker = {
            let count = count.clone();
            let other = other.clone();
            computed(move || count.get() + other.get())
        };
        tracker.get();

        let watcher = Watcher::new(|| {});
        watcher.watch(tracker.as_any_computed());

        count.set(1);
        other.set(1);

        assert_eq!(watcher.take_pending().len(), 1);
    }
}
