// ============================================================================
// spark-element - Signal Cells
// Writable reactive values with equality-gated change propagation
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::context::track_read;
use super::node::{default_equals, AnyComputed, AnySource, EqualsFn, NodeFlags};

// =============================================================================
// SOURCE INNER
// =============================================================================

/// The shared state behind a [`Signal`].
///
/// Kept separate from the handle so it can be stored as `Rc<dyn AnySource>`
/// in dependency lists.
pub struct SourceInner<T> {
    flags: Cell<NodeFlags>,

    value: RefCell<T>,

    /// Computeds that read this cell (weak: dependents own their deps, not
    /// the other way around).
    dependents: RefCell<Vec<Weak<dyn AnyComputed>>>,

    equals: EqualsFn<T>,
}

impl<T> SourceInner<T> {
    fn new(value: T, equals: EqualsFn<T>) -> Self {
        Self {
            flags: Cell::new(NodeFlags::SOURCE | NodeFlags::CLEAN),
            value: RefCell::new(value),
            dependents: RefCell::new(Vec::new()),
            equals,
        }
    }

    /// Status and kind bits of this node.
    pub fn flags(&self) -> NodeFlags {
        self.flags.get()
    }

    /// Number of live dependents (test hook).
    pub fn dependent_count(&self) -> usize {
        self.dependents
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

impl<T: 'static> AnySource for SourceInner<T> {
    fn add_dependent(&self, dependent: Weak<dyn AnyComputed>) {
        self.dependents.borrow_mut().push(dependent);
    }

    fn remove_dependent(&self, dependent: *const ()) {
        self.dependents.borrow_mut().retain(|weak| match weak.upgrade() {
            Some(rc) => Rc::as_ptr(&rc) as *const () != dependent,
            None => false,
        });
    }

    fn prune_dead_dependents(&self) {
        self.dependents.borrow_mut().retain(|w| w.strong_count() > 0);
    }
}

// =============================================================================
// SIGNAL
// =============================================================================

/// A writable reactive cell.
///
/// Reads inside a computed evaluation register the cell as a dependency.
/// Writes are equality-gated: setting an equal value propagates nothing.
pub struct Signal<T> {
    inner: Rc<SourceInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Create a signal using `PartialEq` to detect changes.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_equals(value, default_equals)
    }

    /// Create a signal with a custom equality function.
    pub fn with_equals(value: T, equals: EqualsFn<T>) -> Self {
        Self {
            inner: Rc::new(SourceInner::new(value, equals)),
        }
    }

    /// Read the current value, registering a dependency when tracked.
    pub fn get(&self) -> T {
        track_read(self.inner.clone() as Rc<dyn AnySource>);
        self.inner.value.borrow().clone()
    }

    /// Read the current value without registering a dependency.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, registering a dependency when tracked.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        track_read(self.inner.clone() as Rc<dyn AnySource>);
        f(&self.inner.value.borrow())
    }

    /// Write a new value. Returns whether the value changed; dependents are
    /// marked stale only on change.
    pub fn set(&self, value: T) -> bool {
        let changed = {
            let current = self.inner.value.borrow();
            !(self.inner.equals)(&current, &value)
        };

        if !changed {
            return false;
        }

        *self.inner.value.borrow_mut() = value;
        self.notify_dependents();
        true
    }

    /// Mutate the value in place and propagate to dependents.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.notify_dependents();
    }

    fn notify_dependents(&self) {
        self.inner.prune_dead_dependents();

        // Collect-then-mutate: release the dependents borrow before marking,
        // since mark_stale can re-enter this source's lists via cascades.
        let dependents: Vec<Rc<dyn AnyComputed>> = self
            .inner
            .dependents
            .borrow()
            .iter()
            .filter_map(|w| w.upgrade())
            .collect();

        for dependent in dependents {
            dependent.mark_stale();
        }
    }

    /// The shared inner node (for dependency bookkeeping in tests).
    pub fn inner(&self) -> &Rc<SourceInner<T>> {
        &self.inner
    }
}

/// Create a signal using `PartialEq` to detect changes.
pub fn signal<T: Clone + PartialEq + 'static>(value: T) -> Signal<T> {
    Signal::new(value)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set() {
        let count = signal(0);
        assert_eq!(count.get(), 0);

        assert!(count.set(42));
        assert_eq!(count.get(), 42);
    }

    #[test]
    fn set_equal_value_reports_no_change() {
        let count = signal(7);
        assert!(!count.set(7));
        assert!(count.set(8));
    }

    #[test]
    fn with_borrows_without_clone() {
        let items = signal(vec![1, 2, 3]);
        let sum = items.with(|v| v.iter().sum::<i32>());
        assert_eq!(sum, 6);
    }

    #[test]
    fn update_mutates_in_place() {
        let items = signal(vec![1, 2]);
        items.update(|v| v.push(3));
        assert_eq!(items.get(), vec![1, 2, 3]);
    }

    #[test]
    fn custom_equality() {
        fn never<T>(_: &T, _: &T) -> bool {
            false
        }

        let count = Signal::with_equals(1, never::<i32>);
        // Equal write still counts as a change under never-equal.
        assert!(count.set(1));
    }

    #[test]
    fn source_nodes_carry_kind_and_status_flags() {
        let count = signal(1);
        assert!(count.inner().flags().contains(NodeFlags::SOURCE));
        assert!(count.inner().flags().contains(NodeFlags::CLEAN));
    }

    #[test]
    fn peek_does_not_track() {
        use crate::signals::context::with_context;

        let count = signal(5);

        let outer = with_context(|ctx| ctx.begin_collect());
        let _ = count.peek();
        let deps = with_context(|ctx| ctx.end_collect(outer));
        assert!(deps.is_empty());

        let outer = with_context(|ctx| ctx.begin_collect());
        let _ = count.get();
        let deps = with_context(|ctx| ctx.end_collect(outer));
        assert_eq!(deps.len(), 1);
    }
}
