// ============================================================================
// spark-element - Tracking Context
// Thread-local state for dependency collection during computed evaluation
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::node::{ptr_id, AnySource};

/// Thread-local tracking state.
///
/// While a computed evaluates, `collecting` holds the dependency list being
/// built for it. Nested evaluations save and restore the outer list, so the
/// context behaves as a stack without storing one.
pub struct TrackingContext {
    /// Dependencies collected for the computed currently evaluating.
    /// `None` when no tracked evaluation is in progress.
    collecting: RefCell<Option<Vec<Rc<dyn AnySource>>>>,

    /// Whether reads are currently exempt from tracking.
    untracking: Cell<bool>,
}

impl TrackingContext {
    fn new() -> Self {
        Self {
            collecting: RefCell::new(None),
            untracking: Cell::new(false),
        }
    }

    /// Begin a tracked evaluation, returning the outer collection to restore.
    pub fn begin_collect(&self) -> Option<Vec<Rc<dyn AnySource>>> {
        self.collecting.replace(Some(Vec::new()))
    }

    /// End a tracked evaluation: restore the outer collection and return the
    /// dependencies gathered since `begin_collect`.
    pub fn end_collect(
        &self,
        outer: Option<Vec<Rc<dyn AnySource>>>,
    ) -> Vec<Rc<dyn AnySource>> {
        self.collecting.replace(outer).unwrap_or_default()
    }

    /// Whether reads are currently being tracked.
    pub fn is_tracking(&self) -> bool {
        !self.untracking.get() && self.collecting.borrow().is_some()
    }

    fn set_untracking(&self, value: bool) -> bool {
        self.untracking.replace(value)
    }

    fn record(&self, source: Rc<dyn AnySource>) {
        if self.untracking.get() {
            return;
        }
        let mut collecting = self.collecting.borrow_mut();
        if let Some(deps) = collecting.as_mut() {
            // Linear dedup: dependency lists are short-lived and small.
            let id = ptr_id(&source);
            if !deps.iter().any(|d| ptr_id(d) == id) {
                deps.push(source);
            }
        }
    }
}

thread_local! {
    static CONTEXT: TrackingContext = TrackingContext::new();
}

/// Access the thread-local tracking context.
pub fn with_context<R>(f: impl FnOnce(&TrackingContext) -> R) -> R {
    CONTEXT.with(f)
}

/// Record a read of `source` into the active dependency collection, if any.
pub(crate) fn track_read(source: Rc<dyn AnySource>) {
    with_context(|ctx| ctx.record(source));
}

/// Check if a tracked evaluation is in progress (and not suspended by
/// [`untrack`]).
pub fn is_tracking() -> bool {
    with_context(|ctx| ctx.is_tracking())
}

/// Read reactive values inside `f` without registering dependencies.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let prev = with_context(|ctx| ctx.set_untracking(true));

    // Guard restores the flag even if `f` panics.
    struct UntrackGuard {
        prev: bool,
    }

    impl Drop for UntrackGuard {
        fn drop(&mut self) {
            with_context(|ctx| {
                ctx.set_untracking(self.prev);
            });
        }
    }

    let _guard = UntrackGuard { prev };
    f()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Weak;

    use crate::signals::node::AnyComputed;

    struct DummySource;

    impl AnySource for DummySource {
        fn add_dependent(&self, _dependent: Weak<dyn AnyComputed>) {}
        fn remove_dependent(&self, _dependent: *const ()) {}
        fn prune_dead_dependents(&self) {}
    }

    #[test]
    fn not_tracking_outside_collection() {
        assert!(!is_tracking());
    }

    #[test]
    fn collect_gathers_recorded_sources() {
        let source: Rc<dyn AnySource> = Rc::new(DummySource);

        let outer = with_context(|ctx| ctx.begin_collect());
        assert!(is_tracking());

        track_read(source.clone());
        track_read(source.clone());

        let deps = with_context(|ctx| ctx.end_collect(outer));
        // Duplicate reads collapse to one dependency.
        assert_eq!(deps.len(), 1);
        assert!(!is_tracking());
    }

    #[test]
    fn nested_collections_restore_outer() {
        let a: Rc<dyn AnySource> = Rc::new(DummySource);
        let b: Rc<dyn AnySource> = Rc::new(DummySource);

        let outer = with_context(|ctx| ctx.begin_collect());
        track_read(a);

        let inner = with_context(|ctx| ctx.begin_collect());
        track_read(b);
        let inner_deps = with_context(|ctx| ctx.end_collect(inner));
        assert_eq!(inner_deps.len(), 1);

        let outer_deps = with_context(|ctx| ctx.end_collect(outer));
        assert_eq!(outer_deps.len(), 1);
    }

    #[test]
    fn untrack_suppresses_recording() {
        let source: Rc<dyn AnySource> = Rc::new(DummySource);

        let outer = with_context(|ctx| ctx.begin_collect());
        untrack(|| track_read(source));
        let deps = with_context(|ctx| ctx.end_collect(outer));

        assert!(deps.is_empty());
    }

    #[test]
    fn untrack_restores_on_panic() {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            untrack(|| panic!("intentional panic"));
        }));

        assert!(result.is_err());
        assert!(!with_context(|ctx| ctx.untracking.get()));
    }
}
