// ============================================================================
// spark-element - Computed Nodes
// Lazy cached computations with full dependency re-collection per run
// ============================================================================
//
// A computed is BOTH a source (its dependents can read and track it) AND a
// reaction (it re-evaluates when marked stale). Staleness is pushed: a write
// marks dependents DIRTY and reports watched nodes to their watchers; values
// are pulled on the next read or watcher-driven refresh.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::context::{track_read, with_context};
use super::node::{
    default_equals, ptr_id, AnyComputed, AnySource, EqualsFn, NodeFlags,
};
use super::watcher::WatcherInner;

// =============================================================================
// COMPUTED INNER
// =============================================================================

/// The shared state behind a [`Computed`].
pub struct ComputedInner<T> {
    flags: Cell<NodeFlags>,

    /// The computation. Held for the node's whole life; cleared never, so a
    /// disposed node is gated by flags instead.
    func: RefCell<Box<dyn Fn() -> T>>,

    /// Cached value. `None` until the first evaluation.
    value: RefCell<Option<T>>,

    equals: EqualsFn<T>,

    /// Sources read during the last evaluation (strong: a computed keeps its
    /// dependencies alive).
    deps: RefCell<Vec<Rc<dyn AnySource>>>,

    /// Computeds that read this node.
    dependents: RefCell<Vec<Weak<dyn AnyComputed>>>,

    /// Watchers tracking this node.
    watchers: RefCell<Vec<Weak<WatcherInner>>>,

    /// Weak self-reference for handing out trait-object views.
    self_ref: RefCell<Weak<ComputedInner<T>>>,
}

impl<T: Clone + 'static> ComputedInner<T> {
    pub(crate) fn new(func: Box<dyn Fn() -> T>, equals: EqualsFn<T>) -> Rc<Self> {
        let inner = Rc::new(Self {
            // Born dirty: the first read performs the first evaluation.
            flags: Cell::new(NodeFlags::COMPUTED | NodeFlags::SOURCE | NodeFlags::DIRTY),
            func: RefCell::new(func),
            value: RefCell::new(None),
            equals,
            deps: RefCell::new(Vec::new()),
            dependents: RefCell::new(Vec::new()),
            watchers: RefCell::new(Vec::new()),
            self_ref: RefCell::new(Weak::new()),
        });

        *inner.self_ref.borrow_mut() = Rc::downgrade(&inner);
        inner
    }

    fn self_rc(&self) -> Option<Rc<Self>> {
        self.self_ref.borrow().upgrade()
    }

    fn has_flag(&self, flag: NodeFlags) -> bool {
        self.flags.get().contains(flag)
    }

    fn set_status(&self, status: NodeFlags) {
        self.flags.set(self.flags.get().with_status(status));
    }

    /// Re-evaluate: drop old dependency edges, run the computation with
    /// tracking, install the newly collected edges, and cascade staleness to
    /// dependents when the cached value changed.
    fn recompute(self: &Rc<Self>) {
        if self.has_flag(NodeFlags::DISPOSED) {
            return;
        }

        // Clean before running: a write performed by the computation itself
        // re-marks the node and lands on the next flush, not this one.
        self.set_status(NodeFlags::CLEAN);

        // Disconnect from the previous run's dependencies.
        let old_deps = self.deps.take();
        let self_id = self
            .self_rc()
            .map(|rc| Rc::as_ptr(&rc) as *const ())
            .unwrap_or(std::ptr::null());
        for dep in &old_deps {
            dep.remove_dependent(self_id);
        }

        let outer = with_context(|ctx| ctx.begin_collect());
        let new_value = {
            let func = self.func.borrow();
            (*func)()
        };
        let collected = with_context(|ctx| ctx.end_collect(outer));

        // Install the new dependency edges.
        let weak: Weak<dyn AnyComputed> =
            Rc::downgrade(&(self.clone() as Rc<dyn AnyComputed>));
        for dep in &collected {
            dep.add_dependent(weak.clone());
        }
        *self.deps.borrow_mut() = collected;

        let changed = {
            let current = self.value.borrow();
            match current.as_ref() {
                Some(v) => !(self.equals)(v, &new_value),
                None => true,
            }
        };

        if changed {
            *self.value.borrow_mut() = Some(new_value);
            self.cascade_stale();
        }
    }

    /// Mark dependents stale after this node's value changed.
    fn cascade_stale(&self) {
        let dependents: Vec<Rc<dyn AnyComputed>> = self
            .dependents
            .borrow()
            .iter()
            .filter_map(|w| w.upgrade())
            .collect();

        for dependent in dependents {
            dependent.mark_stale();
        }
    }

    /// Watchers currently attached (live ones only).
    fn live_watchers(&self) -> Vec<Rc<WatcherInner>> {
        self.watchers.borrow_mut().retain(|w| w.strong_count() > 0);
        self.watchers
            .borrow()
            .iter()
            .filter_map(|w| w.upgrade())
            .collect()
    }

    /// Number of installed dependencies (test hook).
    pub fn dep_count(&self) -> usize {
        self.deps.borrow().len()
    }
}

impl<T: Clone + 'static> AnySource for ComputedInner<T> {
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

impl<T: Clone + 'static> AnyComputed for ComputedInner<T> {
    fn mark_stale(&self) {
        if self.has_flag(NodeFlags::DIRTY) || self.has_flag(NodeFlags::DISPOSED) {
            // Already stale: watchers were told on the first transition.
            return;
        }
        self.set_status(NodeFlags::DIRTY);

        if let Some(self_rc) = self.self_rc() {
            let as_computed: Rc<dyn AnyComputed> = self_rc;
            for watcher in self.live_watchers() {
                watcher.node_went_stale(as_computed.clone());
            }
        }

        self.cascade_stale();
    }

    fn refresh(&self) {
        let uninitialized = self.value.borrow().is_none();
        if self.has_flag(NodeFlags::DIRTY) || uninitialized {
            if let Some(self_rc) = self.self_rc() {
                self_rc.recompute();
            }
        }
    }

    fn is_stale(&self) -> bool {
        self.has_flag(NodeFlags::DIRTY)
    }

    fn set_disposed(&self) {
        self.flags.set(self.flags.get() | NodeFlags::DISPOSED);
    }

    fn attach_watcher(&self, watcher: Weak<WatcherInner>) {
        self.watchers.borrow_mut().push(watcher);
    }

    fn detach_watcher(&self, watcher: &Rc<WatcherInner>) {
        let id = ptr_id(watcher);
        self.watchers.borrow_mut().retain(|weak| match weak.upgrade() {
            Some(rc) => ptr_id(&rc) != id,
            None => false,
        });
    }
}

// =============================================================================
// COMPUTED
// =============================================================================

/// A cached reactive computation.
///
/// `get()` re-evaluates only when a dependency changed since the last run,
/// re-collecting the dependency set on every evaluation.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a computed using `PartialEq` to detect value changes.
    pub fn new(func: impl Fn() -> T + 'static) -> Self
    where
        T: PartialEq,
    {
        Self::with_equals(func, default_equals)
    }

    /// Create a computed with a custom equality function.
    pub fn with_equals(func: impl Fn() -> T + 'static, equals: EqualsFn<T>) -> Self {
        Self {
            inner: ComputedInner::new(Box::new(func), equals),
        }
    }

    /// Read the value, re-evaluating first if stale. Registers this node as
    /// a dependency when tracked.
    pub fn get(&self) -> T {
        self.inner.refresh();
        track_read(self.inner.clone() as Rc<dyn AnySource>);
        self.inner
            .value
            .borrow()
            .as_ref()
            .cloned()
            .expect("computed evaluated to no value")
    }

    /// Whether a dependency changed since the last evaluation.
    pub fn is_stale(&self) -> bool {
        AnyComputed::is_stale(&*self.inner)
    }

    /// The shared inner node.
    pub fn inner(&self) -> &Rc<ComputedInner<T>> {
        &self.inner
    }

    /// This node as a type-erased computed, for watcher registration.
    pub fn as_any_computed(&self) -> Rc<dyn AnyComputed> {
        self.inner.clone()
    }
}

/// Create a computed using `PartialEq` to detect value changes.
pub fn computed<T: Clone + PartialEq + 'static>(
    func: impl Fn() -> T + 'static,
) -> Computed<T> {
    Computed::new(func)
}

// =============================================================================
// TESTS
// =============================================================================
