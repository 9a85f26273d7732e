// ============================================================================
// spark-element - Effect Binding
// Re-runs a callback when signals it read change, cleanup before each re-run
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::signals::computed::Computed;
use crate::signals::never_equals;
use crate::signals::node::AnyComputed;

use super::batcher::Batcher;

/// Cleanup returned by an effect callback; runs before the next invocation
/// and on disposal.
pub type Cleanup = Box<dyn FnOnce()>;

// =============================================================================
// EFFECT
// =============================================================================

struct EffectState {
    node: Rc<dyn AnyComputed>,
    batcher: Batcher,
    cleanup: Rc<RefCell<Option<Cleanup>>>,
    disposed: Cell<bool>,
}

/// A signal-driven effect.
///
/// The callback is wrapped in a computed watched by the batcher: any signal
/// read during a run re-triggers the callback on the batcher's next flush.
/// The previous run's cleanup (if returned) executes first.
///
/// Disposal is idempotent and also happens on drop. The callback must not
/// own its host: capture a [`WeakHandle`] so a dropped host stays
/// reclaimable even when a binding is leaked.
pub struct Effect {
    state: Rc<EffectState>,
}

impl Effect {
    /// Bind `callback` to `batcher` and run it once immediately.
    pub fn new(
        batcher: &Batcher,
        callback: impl FnMut() -> Option<Cleanup> + 'static,
    ) -> Self {
        let cleanup: Rc<RefCell<Option<Cleanup>>> = Rc::new(RefCell::new(None));

        let node = {
            let cleanup = cleanup.clone();
            let callback = RefCell::new(callback);
            Computed::with_equals(
                move || {
                    if let Some(previous) = cleanup.borrow_mut().take() {
                        previous();
                    }
                    let next = {
                        let mut callback = callback.borrow_mut();
                        (*callback)()
                    };
                    *cleanup.borrow_mut() = next;
                },
                never_equals,
            )
        };

        let node: Rc<dyn AnyComputed> = node.as_any_computed();
        batcher.watch(node.clone());

        // Eager first run: effects take effect at creation, not on some later
        // read.
        node.refresh();

        Self {
            state: Rc::new(EffectState {
                node,
                batcher: batcher.clone(),
                cleanup,
                disposed: Cell::new(false),
            }),
        }
    }

    /// Unregister from the batcher and run the last cleanup. Safe to call
    /// repeatedly; only the first call does anything.
    pub fn dispose(&self) {
        if self.state.disposed.replace(true) {
            return;
        }

        self.state.batcher.unwatch(&self.state.node);
        self.state.node.set_disposed();

        if let Some(cleanup) = self.state.cleanup.borrow_mut().take() {
            cleanup();
        }
    }

    /// Whether the binding was disposed.
    pub fn is_disposed(&self) -> bool {
        self.state.disposed.get()
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        if Rc::strong_count(&self.state) == 1 {
            self.dispose();
        }
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

/// Bind an effect to the process-wide batcher.
pub fn effect(callback: impl FnMut() -> Option<Cleanup> + 'static) -> Effect {
    super::batcher::with_global_batcher(|batcher| Effect::new(batcher, callback))
}

// =============================================================================
// WEAK HANDLE
// =============================================================================

/// A back-reference that may come up empty.
///
/// Effect callbacks hold their host through this: the binding never keeps
/// the host alive, and a reclaimed host is observed as `None` instead of a
/// dangling borrow.
pub struct WeakHandle<T> {
    weak: Weak<T>,
}

impl<T> WeakHandle<T> {
    /// Create a handle to `target` without holding it alive.
    pub fn new(target: &Rc<T>) -> Self {
        Self {
            weak: Rc::downgrade(target),
        }
    }

    /// The target, if it is still alive.
    pub fn get(&self) -> Option<Rc<T>> {
        self.weak.upgrade()
    }

    /// Whether the target has been reclaimed.
    pub fn is_gone(&self) -> bool {
        self.weak.strong_count() == 0
    }
}

impl<T> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        Self {
            weak: self.weak.clone(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::queue::drain_microtasks;
    use crate::signals::source::signal;
    use std::cell::Cell;

    #[test]
    fn effect_runs_eagerly_and_on_change() {
        let batcher = Batcher::new();
        let runs = Rc::new(Cell::new(0));
        let count = signal(0);

        let _effect = {
            let runs = runs.clone();
            let count = count.clone();
            Effect::new(&batcher, move || {
                let _ = count.get();
                runs.set(runs.get() + 1);
                None
            })
        };

        assert_eq!(runs.get(), 1);

        count.set(1);
        drain_microtasks();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn cleanup_runs_before_each_rerun_and_on_dispose() {
        let batcher = Batcher::new();
        let cleanups = Rc::new(Cell::new(0));
        let count = signal(0);

        let effect = {
            let cleanups = cleanups.clone();
            let count = count.clone();
            Effect::new(&batcher, move || {
                let _ = count.get();
                let cleanups = cleanups.clone();
                Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as Cleanup)
            })
        };

        // First run returned a cleanup but nothing has re-run yet.
        assert_eq!(cleanups.get(), 0);

        count.set(1);
        drain_microtasks();
        assert_eq!(cleanups.get(), 1);

        effect.dispose();
        assert_eq!(cleanups.get(), 2);
    }

    #[test]
    fn dispose_is_idempotent() {
        let batcher = Batcher::new();
        let cleanups = Rc::new(Cell::new(0));

        let effect = {
            let cleanups = cleanups.clone();
            Effect::new(&batcher, move || {
                let cleanups = cleanups.clone();
                Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as Cleanup)
            })
        };

        effect.dispose();
        effect.dispose();
        effect.dispose();
        assert_eq!(cleanups.get(), 1);
        assert!(effect.is_disposed());
    }

    #[test]
    fn disposed_effect_stops_reacting() {
        let batcher = Batcher::new();
        let runs = Rc::new(Cell::new(0));
        let count = signal(0);

        let effect = {
            let runs = runs.clone();
            let count = count.clone();
            Effect::new(&batcher, move || {
                let _ = count.get();
                runs.set(runs.get() + 1);
                None
            })
        };

        assert_eq!(runs.get(), 1);
        effect.dispose();

        count.set(1);
        drain_microtasks();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn drop_disposes_the_binding() {
        let batcher = Batcher::new();
        let cleanups = Rc::new(Cell::new(0));
        let count = signal(0);

        {
            let _effect = {
                let cleanups = cleanups.clone();
                let count = count.clone();
                Effect::new(&batcher, move || {
                    let _ = count.get();
                    let cleanups = cleanups.clone();
                    Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as Cleanup)
                })
            };
        }

        assert_eq!(cleanups.get(), 1);
        count.set(1);
        drain_microtasks();
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn weak_handle_observes_reclaimed_host() {
        let host = Rc::new(String::from("host"));
        let handle = WeakHandle::new(&host);

        assert!(!handle.is_gone());
        assert_eq!(handle.get().as_deref().map(String::as_str), Some("host"));

        drop(host);
        assert!(handle.is_gone());
        assert!(handle.get().is_none());
    }

    #[test]
    fn effect_with_weak_host_survives_host_drop() {
        let batcher = Batcher::new();
        let renders = Rc::new(Cell::new(0));
        let count = signal(0);

        let host = Rc::new(String::from("component"));
        let handle = WeakHandle::new(&host);

        let _effect = {
            let renders = renders.clone();
            let count = count.clone();
            Effect::new(&batcher, move || {
                let _ = count.get();
                if handle.get().is_some() {
                    renders.set(renders.get() + 1);
                }
                None
            })
        };

        assert_eq!(renders.get(), 1);

        drop(host);
        count.set(1);
        // The binding still fires but finds its host gone: no render, no
        // panic.
        drain_microtasks();
        assert_eq!(renders.get(), 1);
    }
}
