//! # spark-element
//!
//! Reactive component runtime for Rust: signal-driven update scheduling for
//! host-mounted UI elements.
//!
//! ## Architecture
//!
//! Components are [`Element`] instances whose reactive properties live in
//! signal-backed slots. Property writes and signal changes flow through a
//! process-wide batcher into per-instance update pipelines:
//!
//! ```text
//! signal write → Batcher wakes (once per turn) → flush refreshes pending
//! computeds → Effect bindings re-run → Update pipeline diffs properties →
//! component renders → update-complete promise resolves
//! ```
//!
//! Scheduling is single-threaded and cooperative: deferred work sits on an
//! explicit microtask queue that the embedding environment drains
//! ([`drain_microtasks`]), which makes batching and ordering guarantees
//! reproducible under test.
//!
//! ## Modules
//!
//! - [`signals`] - signal cells, computeds, watchers (the reactive graph)
//! - [`scheduler`] - microtask queue, batcher, effect bindings, deferreds
//! - [`element`] - element definitions, update pipeline, properties,
//!   attributes, controllers
//! - [`host`] - host tree, render contract, container resolution
//! - [`types`] - the typed property value model
//! - [`errors`] - error taxonomy
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//! use spark_element::{
//!     drain_microtasks, Component, Element, ElementDefinition, HookError,
//!     HostNode, PropertyDeclaration, Template, TypeTag,
//! };
//!
//! struct Counter;
//!
//! impl Component for Counter {
//!     fn render(&mut self, host: &Element) -> Result<Template, HookError> {
//!         let count = host.property("count")?;
//!         Ok(Template::new(format!("<span>{:?}</span>", count)))
//!     }
//! }
//!
//! let definition = Rc::new(
//!     ElementDefinition::new("x-counter")
//!         .property(PropertyDeclaration::new("count", TypeTag::Number)),
//! );
//!
//! let element = Element::new(definition, Counter);
//! let root = HostNode::new("x-counter");
//! element.connect(&root);
//!
//! element.set_property("count", 1).unwrap();
//! drain_microtasks();
//!
//! assert!(element.has_updated());
//! assert!(root.content().is_some());
//! ```

pub mod element;
pub mod errors;
pub mod host;
pub mod scheduler;
pub mod signals;
pub mod types;

// Re-export the component surface at the crate root.
pub use element::{
    define, lookup, reset_registry, AttributeMode, ChangedProperties, Component, Element,
    ElementDefinition, HasChangedFn, PropName, PropertyDeclaration, ReactiveController,
};

pub use element::attributes::{coerce_attribute, reflect_value};

// Re-export the host contracts.
pub use host::{
    attach_container, resolve_container, Container, HostNode, HostRenderer, RenderHandle,
    RenderOptions, Renderer, Template,
};

// Re-export the scheduling surface.
pub use scheduler::{
    clear_unhandled_error_hook, drain_microtasks, effect, enqueue_microtask,
    global_batcher, pending_microtasks, reset_global_batcher, set_unhandled_error_hook,
    with_global_batcher, Batcher, Cleanup, Deferred, Effect, WeakHandle,
};

// Re-export the reactive primitives.
pub use signals::{
    computed, default_equals, is_tracking, never_equals, signal, untrack, Computed,
    EqualsFn, Signal, Watcher,
};

pub use errors::{
    CoercionError, CreateError, DefineError, HookError, UnknownProperty, UpdateError,
};
pub use types::{TypeTag, Value};
