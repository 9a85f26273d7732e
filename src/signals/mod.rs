//! Signal primitive.
//!
//! Fine-grained reactive cells and computations:
//!
//! - [`Signal`] - writable cell; reads are tracked, writes equality-gated
//! - [`Computed`] - lazy cached computation over other nodes
//! - [`Watcher`] - tracking set reporting which computeds went stale
//!
//! # Staleness model
//!
//! ```text
//! Signal::set → mark dependents DIRTY → report watched nodes to watchers
//!                     (push)                      (push)
//! Computed::get / refresh → recompute if DIRTY, re-collect dependencies
//!                     (pull)
//! ```
//!
//! Dependency edges are rebuilt on every evaluation, so conditional reads
//! drop dependencies they no longer exercise. All state is thread-local;
//! there is no cross-thread graph.

pub mod computed;
pub mod context;
pub mod node;
pub mod source;
pub mod watcher;

pub use computed::{computed, Computed, ComputedInner};
pub use context::{is_tracking, untrack, with_context};
pub use node::{default_equals, never_equals, AnyComputed, AnySource, EqualsFn, NodeFlags};
pub use source::{signal, Signal, SourceInner};
pub use watcher::{Watcher, WatcherInner};
