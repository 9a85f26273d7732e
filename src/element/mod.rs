//! Reactive elements.
//!
//! An [`Element`] binds user component logic to the update scheduler: its
//! reactive properties live in signal-backed slots, property writes feed the
//! per-cycle changed-set and request an update, and a single effect binding
//! re-runs the update pipeline whenever a signal it read changes.
//!
//! ```text
//! set_property → changed-set + signal write → request_update
//!       signal write → batcher flush (microtask) → effect → perform_update
//! perform_update → should_update → before_update → render → settle
//! ```
//!
//! Update cycles for one instance are strictly serialized: cycle k+1 waits
//! on cycle k's settle before it can begin rendering.

pub mod attributes;
pub mod controllers;
pub mod properties;
pub mod registry;
pub mod update;

pub use controllers::ReactiveController;
pub use properties::{
    AttributeMode, ChangedProperties, HasChangedFn, PropName, PropertyDeclaration,
};
pub use registry::{define, lookup, reset_registry, ElementDefinition};

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::errors::{CoercionError, CreateError, HookError, UnknownProperty};
use crate::host::{HostNode, HostRenderer, RenderHandle, Renderer, Template};
use crate::scheduler::batcher::{global_batcher, Batcher};
use crate::scheduler::deferred::Deferred;
use crate::scheduler::effect::Effect;
use crate::signals::{never_equals, Signal};
use crate::types::Value;

// =============================================================================
// COMPONENT
// =============================================================================

/// User component logic driven by an [`Element`]'s update pipeline.
///
/// Only `render` is required. `should_update`, `before_update` and `render`
/// may fail; a failure settles the cycle and is re-raised through the
/// scheduler's unhandled-error path, so the element stays updatable.
pub trait Component: 'static {
    /// Produce this component's output. Signal and property reads made here
    /// are tracked: their changes re-render the component.
    fn render(&mut self, host: &Element) -> Result<Template, HookError>;

    /// Decide whether the cycle should render. Defaults to yes.
    fn should_update(
        &mut self,
        host: &Element,
        changed: &ChangedProperties,
    ) -> Result<bool, HookError> {
        let _ = (host, changed);
        Ok(true)
    }

    /// Runs after a positive update decision, before `render`.
    fn before_update(
        &mut self,
        host: &Element,
        changed: &ChangedProperties,
    ) -> Result<(), HookError> {
        let _ = (host, changed);
        Ok(())
    }

    /// Runs after the cycle settled with a successful render.
    fn updated(&mut self, host: &Element, changed: &ChangedProperties) {
        let _ = (host, changed);
    }

    /// Runs once, after the very first successful render (after `updated`).
    fn first_updated(&mut self, host: &Element, changed: &ChangedProperties) {
        let _ = (host, changed);
    }
}

// =============================================================================
// ELEMENT
// =============================================================================

pub(crate) struct ElementInner {
    pub(crate) definition: Rc<ElementDefinition>,
    pub(crate) component: RefCell<Box<dyn Component>>,
    pub(crate) batcher: Batcher,

    /// Signal-backed storage, parallel to the definition's declarations.
    /// Slots use never-equal signals: the change decision belongs to the
    /// declaration's predicate, not the cell.
    pub(crate) slots: Vec<Signal<Value>>,

    /// Committed value of each property as of the last recorded write.
    pub(crate) previous: RefCell<IndexMap<PropName, Value>>,

    /// This cycle's changed-set: name → pre-cycle value.
    pub(crate) changed: RefCell<IndexMap<PropName, Value>>,

    pub(crate) is_update_pending: Cell<bool>,
    pub(crate) has_updated: Cell<bool>,
    pub(crate) connected: Cell<bool>,
    pub(crate) ever_connected: Cell<bool>,

    /// Resolves when the in-flight (or next) cycle settles.
    pub(crate) update_done: RefCell<Deferred<bool>>,

    /// Bumped to force the effect's computed stale for request-driven cycles.
    pub(crate) trigger: Signal<u64>,

    pub(crate) effect: RefCell<Option<Effect>>,

    /// Whether the armed effect already ran its subscription-only first pass.
    pub(crate) subscribed: Cell<bool>,

    pub(crate) controllers: RefCell<Vec<Rc<dyn ReactiveController>>>,
    pub(crate) renderer: RefCell<Box<dyn Renderer>>,
    pub(crate) render_handle: RefCell<Option<RenderHandle>>,
    pub(crate) host: RefCell<Option<HostNode>>,

    pub(crate) self_weak: RefCell<Weak<ElementInner>>,
}

/// A host-mounted reactive component instance.
///
/// Handles are cheap clones of shared state; the instance lives as long as
/// any handle (or its armed effect's current run) does.
pub struct Element {
    pub(crate) inner: Rc<ElementInner>,
}

impl Clone for Element {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Element {
    /// Build an instance from a definition, scheduled on the process-wide
    /// batcher.
    pub fn new(definition: Rc<ElementDefinition>, component: impl Component) -> Element {
        Self::with_batcher(definition, component, &global_batcher())
    }

    /// Build an instance scheduled on a specific batcher (isolated tests).
    pub fn with_batcher(
        definition: Rc<ElementDefinition>,
        component: impl Component,
        batcher: &Batcher,
    ) -> Element {
        let slots: Vec<Signal<Value>> = definition
            .properties()
            .iter()
            .map(|decl| Signal::with_equals(decl.default.clone(), never_equals))
            .collect();

        let previous: IndexMap<PropName, Value> = definition
            .properties()
            .iter()
            .map(|decl| (decl.name, decl.default.clone()))
            .collect();

        let inner = Rc::new(ElementInner {
            definition,
            component: RefCell::new(Box::new(component)),
            batcher: batcher.clone(),
            slots,
            previous: RefCell::new(previous),
            changed: RefCell::new(IndexMap::new()),
            is_update_pending: Cell::new(false),
            has_updated: Cell::new(false),
            connected: Cell::new(false),
            ever_connected: Cell::new(false),
            // Nothing in flight yet: the first request chains immediately.
            update_done: RefCell::new(Deferred::resolved(true)),
            trigger: Signal::new(0),
            effect: RefCell::new(None),
            subscribed: Cell::new(false),
            controllers: RefCell::new(Vec::new()),
            renderer: RefCell::new(Box::new(HostRenderer)),
            render_handle: RefCell::new(None),
            host: RefCell::new(None),
            self_weak: RefCell::new(Weak::new()),
        });
        *inner.self_weak.borrow_mut() = Rc::downgrade(&inner);

        Element { inner }
    }

    /// Build an instance of a registered tag.
    pub fn create(tag: &str, component: impl Component) -> Result<Element, CreateError> {
        let definition =
            registry::lookup(tag).ok_or_else(|| CreateError::NotDefined(tag.to_string()))?;
        Ok(Self::new(definition, component))
    }

    /// Replace the render collaborator.
    pub fn set_renderer(&self, renderer: impl Renderer + 'static) {
        *self.inner.renderer.borrow_mut() = Box::new(renderer);
    }

    pub fn definition(&self) -> &Rc<ElementDefinition> {
        &self.inner.definition
    }

    pub fn tag(&self) -> String {
        self.inner.definition.tag().to_string()
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Read a reactive property. Tracked: reading inside a render
    /// subscribes the component to the property.
    pub fn property(&self, name: &str) -> Result<Value, UnknownProperty> {
        let index = self
            .inner
            .definition
            .find_property(name)
            .ok_or_else(|| UnknownProperty(name.to_string()))?;
        Ok(self.inner.slots[index].get())
    }

    /// Read a reactive property without subscribing.
    pub fn peek_property(&self, name: &str) -> Result<Value, UnknownProperty> {
        let index = self
            .inner
            .definition
            .find_property(name)
            .ok_or_else(|| UnknownProperty(name.to_string()))?;
        Ok(self.inner.slots[index].peek())
    }

    /// Write a reactive property.
    ///
    /// When the declaration's predicate reports a change, the pre-cycle
    /// value is recorded once into the changed-set, the slot is written (so
    /// signal readers wake), and an update is requested. Returns whether the
    /// write counted as a change.
    pub fn set_property(
        &self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<bool, UnknownProperty> {
        let index = self
            .inner
            .definition
            .find_property(name)
            .ok_or_else(|| UnknownProperty(name.to_string()))?;
        Ok(self.inner.write_slot(index, value.into()))
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Apply an observed attribute change.
    ///
    /// Unknown attribute names are logged and ignored; coercion failures
    /// propagate to the caller.
    pub fn attribute_changed(
        &self,
        name: &str,
        raw: Option<&str>,
    ) -> Result<(), CoercionError> {
        let Some(index) = self.inner.definition.find_by_attribute(name) else {
            tracing::warn!(
                tag = %self.inner.definition.tag(),
                attribute = %name,
                "ignoring change for unknown reactive attribute"
            );
            return Ok(());
        };

        let type_tag = self.inner.definition.properties()[index].type_tag;
        let value = attributes::coerce_attribute(type_tag, raw)?;
        self.inner.write_slot(index, value);
        Ok(())
    }

    // =========================================================================
    // Update pipeline surface
    // =========================================================================

    /// Ask for an update cycle. Coalescing: requests made while one is
    /// already pending fold into it.
    pub fn request_update(&self) {
        self.inner.request_update();
    }

    /// Handle resolving when the current (or next requested) cycle settles:
    /// `true` when it settled cleanly, `false` when a follow-up cycle was
    /// already queued by then.
    pub fn update_complete(&self) -> Deferred<bool> {
        self.inner.update_done.borrow().clone()
    }

    pub fn is_update_pending(&self) -> bool {
        self.inner.is_update_pending.get()
    }

    /// Whether the instance has rendered successfully at least once.
    pub fn has_updated(&self) -> bool {
        self.inner.has_updated.get()
    }

    /// The handle from the last committed render.
    pub fn render_handle(&self) -> Option<RenderHandle> {
        self.inner.render_handle.borrow().clone()
    }

    /// Resolve the nearest dependency container over the host's ancestry.
    /// `None` until the element has been given a host via [`connect`].
    ///
    /// [`connect`]: Element::connect
    pub fn resolve_container(&self) -> Option<crate::scheduler::Deferred<crate::host::Container>> {
        self.inner
            .host
            .borrow()
            .as_ref()
            .map(crate::host::resolve_container)
    }

    // =========================================================================
    // Controllers
    // =========================================================================

    /// Attach a lifecycle observer. A controller added while connected is
    /// told so immediately.
    pub fn add_controller(&self, controller: Rc<dyn ReactiveController>) {
        if self.inner.connected.get() {
            controller.host_connected();
        }
        self.inner.controllers.borrow_mut().push(controller);
    }

    /// Detach a previously added controller (by identity).
    pub fn remove_controller(&self, controller: &Rc<dyn ReactiveController>) {
        let id = Rc::as_ptr(controller) as *const ();
        self.inner
            .controllers
            .borrow_mut()
            .retain(|c| Rc::as_ptr(c) as *const () != id);
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Attach to the hosting structure. The first connection arms the effect
    /// binding and drives the initial render; later connections resume any
    /// update left pending while disconnected.
    pub fn connect(&self, host: &HostNode) {
        *self.inner.host.borrow_mut() = Some(host.clone());
        self.inner.connected.set(true);
        self.inner.arm();

        for controller in self.inner.controllers_snapshot() {
            controller.host_connected();
        }

        if !self.inner.ever_connected.replace(true) {
            if self.inner.is_update_pending.get() {
                self.inner.bump_trigger();
            } else {
                self.inner.request_update();
            }
        } else if self.inner.is_update_pending.get() {
            self.inner.bump_trigger();
        }
    }

    /// Detach from the hosting structure. The effect binding is disarmed a
    /// microtask later, only if still disconnected - a reconnect within the
    /// same turn keeps it.
    pub fn disconnect(&self) {
        self.inner.connected.set(false);

        for controller in self.inner.controllers_snapshot() {
            controller.host_disconnected();
        }

        let weak = self.inner.self_weak.borrow().clone();
        crate::scheduler::queue::enqueue_microtask(move || {
            if let Some(inner) = weak.upgrade() {
                if !inner.connected.get() {
                    inner.disarm();
                }
            }
        });
    }

    /// Whether the element is currently connected.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.get()
    }

    /// Permanent teardown: disconnect semantics plus immediate disarming.
    pub fn dispose(&self) {
        if self.inner.connected.replace(false) {
            for controller in self.inner.controllers_snapshot() {
                controller.host_disconnected();
            }
        }
        self.inner.disarm();
    }
}

impl ElementInner {
    pub(crate) fn controllers_snapshot(&self) -> Vec<Rc<dyn ReactiveController>> {
        self.controllers.borrow().clone()
    }

    /// Record a changed write into slot `index` and request an update.
    /// Returns whether the write counted as a change.
    pub(crate) fn write_slot(&self, index: usize, value: Value) -> bool {
        let decl = &self.definition.properties()[index];
        let old = self
            .previous
            .borrow()
            .get(decl.name)
            .cloned()
            .unwrap_or_else(|| decl.default.clone());

        if !decl.changed(&old, &value) {
            return false;
        }

        {
            let mut changed = self.changed.borrow_mut();
            // First difference this cycle wins: re-changes keep the original
            // pre-cycle value.
            changed.entry(decl.name).or_insert(old);
        }
        self.previous.borrow_mut().insert(decl.name, value.clone());

        self.slots[index].set(value);
        self.request_update();
        true
    }
}

// =============================================================================
// TESTS
// =============================================================================
