// ============================================================================
// spark-element - Reactive Graph Nodes
// Type-erased traits and status flags for the signal graph
// ============================================================================
//
// Graph operations (marking stale, attaching dependents, watcher bookkeeping)
// never need to know a node's value type. The type-erased traits below let
// sources hold `Weak<dyn AnyComputed>` dependents and computeds hold
// `Rc<dyn AnySource>` dependencies, so differently-typed nodes live in the
// same graph.
// ============================================================================

use std::rc::{Rc, Weak};

use bitflags::bitflags;

use super::watcher::WatcherInner;

bitflags! {
    /// Status and kind bits carried by every graph node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u32 {
        /// Node can be read and tracked as a dependency.
        const SOURCE = 1 << 0;
        /// Node caches a computation over other nodes.
        const COMPUTED = 1 << 1;

        /// Value is up to date.
        const CLEAN = 1 << 4;
        /// A dependency changed since the last evaluation.
        const DIRTY = 1 << 5;
        /// Node was torn down and must never re-evaluate.
        const DISPOSED = 1 << 6;
    }
}

impl NodeFlags {
    /// The mutually exclusive status bits.
    pub const STATUS: NodeFlags = NodeFlags::CLEAN.union(NodeFlags::DIRTY);

    /// Replace the status bits with `status`, leaving kind bits untouched.
    #[must_use]
    pub fn with_status(self, status: NodeFlags) -> NodeFlags {
        (self - NodeFlags::STATUS) | status
    }
}

// =============================================================================
// TYPE-ERASED TRAITS
// =============================================================================

/// A readable node: something a computed can depend on.
///
/// Implemented by `SourceInner<T>` (signal cells) and `ComputedInner<T>`
/// (computeds are sources for their own dependents).
pub trait AnySource: 'static {
    /// Register a computed that read this source.
    fn add_dependent(&self, dependent: Weak<dyn AnyComputed>);

    /// Remove the dependent with the given identity (see [`ptr_id`]).
    fn remove_dependent(&self, dependent: *const ());

    /// Drop dependents whose strong references are gone.
    fn prune_dead_dependents(&self);
}

/// A recomputable node: something that reacts to its dependencies changing.
///
/// Implemented by `ComputedInner<T>`. Watchers and the batcher only ever see
/// computeds through this trait.
pub trait AnyComputed: 'static {
    /// Mark this node stale, report it to its watchers, and cascade to its
    /// own dependents. Idempotent while the node is already stale.
    fn mark_stale(&self);

    /// Re-evaluate now if stale. A clean or disposed node is a no-op.
    fn refresh(&self);

    /// Whether a dependency changed since the last evaluation.
    fn is_stale(&self) -> bool;

    /// Permanently retire the node; later refreshes are no-ops.
    fn set_disposed(&self);

    /// Attach a watcher to be told when this node goes stale.
    fn attach_watcher(&self, watcher: Weak<WatcherInner>);

    /// Detach a previously attached watcher.
    fn detach_watcher(&self, watcher: &Rc<WatcherInner>);
}

// =============================================================================
// EQUALITY FUNCTIONS
// =============================================================================

/// Equality function used to decide whether a write changed a value.
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// Default equality via `PartialEq`.
pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Treat every write as a change, even when values compare equal.
pub fn never_equals<T>(_: &T, _: &T) -> bool {
    false
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Identity of an `Rc`-held node, usable across different trait-object views
/// of the same allocation.
pub fn ptr_id<T: ?Sized>(rc: &Rc<T>) -> *const () {
    Rc::as_ptr(rc) as *const ()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_are_distinct() {
        assert_eq!(NodeFlags::SOURCE & NodeFlags::COMPUTED, NodeFlags::empty());
        assert_eq!(NodeFlags::CLEAN & NodeFlags::DIRTY, NodeFlags::empty());
        assert_eq!(NodeFlags::DIRTY & NodeFlags::DISPOSED, NodeFlags::empty());
    }

    #[test]
    fn with_status_replaces_only_status_bits() {
        let flags = NodeFlags::COMPUTED | NodeFlags::SOURCE | NodeFlags::DIRTY;
        let cleaned = flags.with_status(NodeFlags::CLEAN);

        assert!(cleaned.contains(NodeFlags::COMPUTED));
        assert!(cleaned.contains(NodeFlags::SOURCE));
        assert!(cleaned.contains(NodeFlags::CLEAN));
        assert!(!cleaned.contains(NodeFlags::DIRTY));
    }

    #[test]
    fn equality_helpers() {
        assert!(default_equals(&1, &1));
        assert!(!default_equals(&1, &2));
        assert!(!never_equals(&1, &1));
    }

    #[test]
    fn ptr_id_is_stable_across_clones() {
        let a = Rc::new(5);
        let b = a.clone();
        assert_eq!(ptr_id(&a), ptr_id(&b));

        let c = Rc::new(5);
        assert_ne!(ptr_id(&a), ptr_id(&c));
    }
}
