// ============================================================================
// spark-element - Update Pipeline
// The per-instance request → schedule → render → settle state machine
// ============================================================================
//
// One cycle may be in flight per instance. Requests made while pending
// coalesce into the in-flight cycle. Cycle k+1 chains on cycle k's settle
// promise, so renders for one instance never overlap or reorder.
//
// The pipeline never calls itself: it bumps a trigger signal and lets the
// batcher's flush re-run the element's effect, which keeps every render on
// the same scheduling path whether it came from a property write, an
// explicit request, or an external signal read during render.
// ============================================================================

use std::rc::Rc;

use crate::errors::UpdateError;
use crate::host::RenderOptions;
use crate::scheduler::deferred::Deferred;
use crate::scheduler::effect::{Effect, WeakHandle};

use super::attributes;
use super::properties::ChangedProperties;
use super::{Element, ElementInner};

impl ElementInner {
    // =========================================================================
    // Requesting
    // =========================================================================

    /// Enter the pending state and schedule a cycle after the previous one
    /// settles. No-op while a cycle is already pending.
    pub(crate) fn request_update(&self) {
        if self.is_update_pending.replace(true) {
            return;
        }

        let previous = {
            let mut slot = self.update_done.borrow_mut();
            std::mem::replace(&mut *slot, Deferred::new())
        };

        let weak = self.self_weak.borrow().clone();
        previous.then(move |_| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Skip the bump when the cycle already ran through the
            // signal-driven path in the meantime.
            if inner.is_update_pending.get() {
                inner.bump_trigger();
            }
        });
    }

    /// Force the effect's computed stale so the next flush re-runs it.
    pub(crate) fn bump_trigger(&self) {
        self.trigger.set(self.trigger.peek() + 1);
    }

    // =========================================================================
    // Effect binding
    // =========================================================================

    /// Arm the effect binding. The binding holds the host weakly: a host
    /// reclaimed with a live binding is detected, logged, and skipped.
    pub(crate) fn arm(&self) {
        if self.effect.borrow().is_some() {
            return;
        }
        let Some(self_rc) = self.self_weak.borrow().upgrade() else {
            return;
        };

        self.subscribed.set(false);
        let handle = WeakHandle::new(&self_rc);
        let effect = Effect::new(&self.batcher, move || {
            let Some(inner) = handle.get() else {
                tracing::warn!(
                    "host reclaimed while its update effect was still bound; skipping"
                );
                return None;
            };
            ElementInner::effect_pass(&inner);
            None
        });

        *self.effect.borrow_mut() = Some(effect);
    }

    /// Dispose the effect binding, if armed.
    pub(crate) fn disarm(&self) {
        if let Some(effect) = self.effect.borrow_mut().take() {
            effect.dispose();
        }
        self.subscribed.set(false);
    }

    /// The effect body. Subscribes to the trigger and every property slot,
    /// then runs the pending cycle - or starts an implicit one when a signal
    /// woke the binding without an explicit request.
    fn effect_pass(inner: &Rc<ElementInner>) {
        let _ = inner.trigger.get();
        for slot in &inner.slots {
            slot.with(|_| ());
        }

        if !inner.subscribed.replace(true) {
            // Arming pass: subscription only. Renders always arrive through
            // the scheduled path.
            return;
        }

        if !inner.is_update_pending.replace(true) {
            // Signal-driven wake: a dependency changed without a request.
            if inner.update_done.borrow().is_resolved() {
                *inner.update_done.borrow_mut() = Deferred::new();
            }
        }

        inner.perform_update();
    }

    // =========================================================================
    // The cycle
    // =========================================================================

    pub(crate) fn perform_update(self: &Rc<Self>) {
        if !self.connected.get() {
            // Still pending; the cycle resumes when the host reconnects.
            return;
        }

        let element = Element {
            inner: self.clone(),
        };
        let cycle_done = self.update_done.borrow().clone();

        for controller in self.controllers_snapshot() {
            controller.host_update();
        }

        let changed = ChangedProperties::from_map(self.changed.borrow().clone());

        let outcome: Result<bool, UpdateError> = (|| {
            let should = self
                .component
                .borrow_mut()
                .should_update(&element, &changed)
                .map_err(|source| UpdateError {
                    phase: "should_update",
                    source,
                })?;
            if !should {
                return Ok(false);
            }

            self.component
                .borrow_mut()
                .before_update(&element, &changed)
                .map_err(|source| UpdateError {
                    phase: "before_update",
                    source,
                })?;

            let output = self
                .component
                .borrow_mut()
                .render(&element)
                .map_err(|source| UpdateError {
                    phase: "render",
                    source,
                })?;

            if let Some(host) = self.host.borrow().clone() {
                let options = RenderOptions {
                    is_connected: self.connected.get(),
                };
                let handle = self
                    .renderer
                    .borrow_mut()
                    .render(&output, &host, &options);
                *self.render_handle.borrow_mut() = Some(handle);
            }
            Ok(true)
        })();

        match outcome {
            Ok(rendered) => {
                // Re-snapshot: writes made by before_update folded into this
                // cycle and belong in what the settle hooks see.
                let settled_changed =
                    ChangedProperties::from_map(self.changed.borrow().clone());

                if rendered {
                    self.reflect_changed(&settled_changed);
                }
                let first = if rendered {
                    !self.has_updated.replace(true)
                } else {
                    false
                };

                self.mark_settled();

                if rendered {
                    self.component
                        .borrow_mut()
                        .updated(&element, &settled_changed);
                    if first {
                        self.component
                            .borrow_mut()
                            .first_updated(&element, &settled_changed);
                    }
                }

                for controller in self.controllers_snapshot() {
                    controller.host_updated();
                }

                cycle_done.resolve(!self.is_update_pending.get());
            }
            Err(error) => {
                // The failure must not wedge the instance: settle anyway,
                // then surface the error asynchronously.
                self.mark_settled();

                for controller in self.controllers_snapshot() {
                    controller.host_updated();
                }

                cycle_done.resolve(!self.is_update_pending.get());
                crate::scheduler::raise_async(error);
            }
        }
    }

    /// Explicit reset at the end of every cycle, rendered or not.
    fn mark_settled(&self) {
        self.changed.borrow_mut().clear();
        self.is_update_pending.set(false);
    }

    /// Write changed reflecting properties back to host attributes.
    fn reflect_changed(&self, changed: &ChangedProperties) {
        let Some(host) = self.host.borrow().clone() else {
            return;
        };

        for (name, _) in changed.iter() {
            let Some(index) = self.definition.find_property(name) else {
                continue;
            };
            let decl = &self.definition.properties()[index];
            if !decl.reflect {
                continue;
            }
            let Some(attribute) = decl.attribute_name() else {
                continue;
            };
            match attributes::reflect_value(&self.slots[index].peek()) {
                Some(serialized) => host.set_attribute(attribute, serialized),
                None => host.remove_attribute(&attribute),
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementDefinition, PropertyDeclaration};
    use crate::errors::HookError;
    use crate::host::{HostNode, Template};
    use crate::scheduler::batcher::Batcher;
    use crate::scheduler::queue::drain_microtasks;
    use crate::types::{TypeTag, Value};
    use std::cell::Cell;

    struct Recorder {
        renders: Rc<Cell<u32>>,
    }

    impl crate::element::Component for Recorder {
        fn render(&mut self, host: &Element) -> Result<Template, HookError> {
            self.renders.set(self.renders.get() + 1);
            let count = host.property("count")?;
            Ok(Template::new(format!("count={:?}", count)))
        }
    }

    fn setup() -> (Element, HostNode, Rc<Cell<u32>>, Batcher) {
        let renders = Rc::new(Cell::new(0));
        let definition = Rc::new(
            ElementDefinition::new("x-counter")
                .property(PropertyDeclaration::new("count", TypeTag::Number)),
        );
        let batcher = Batcher::new();
        let element = Element::with_batcher(
            definition,
            Recorder {
                renders: renders.clone(),
            },
            &batcher,
        );
        let host = HostNode::new("x-counter");
        (element, host, renders, batcher)
    }

    #[test]
    fn first_connection_drives_the_initial_render() {
        let (element, host, renders, _batcher) = setup();

        element.connect(&host);
        // Rendering is scheduled, not synchronous.
        assert_eq!(renders.get(), 0);
        assert!(element.is_update_pending());

        drain_microtasks();
        assert_eq!(renders.get(), 1);
        assert!(!element.is_update_pending());
        assert!(element.has_updated());
        assert_eq!(element.update_complete().value(), Some(true));
    }

    #[test]
    fn reconnect_without_changes_does_not_rerender() {
        let (element, host, renders, _batcher) = setup();
        element.connect(&host);
        drain_microtasks();
        assert_eq!(renders.get(), 1);

        element.disconnect();
        drain_microtasks();
        element.connect(&host);
        drain_microtasks();
        assert_eq!(renders.get(), 1);
    }

    #[test]
    fn pending_update_survives_a_disconnect() {
        let (element, host, renders, _batcher) = setup();
        element.connect(&host);
        drain_microtasks();
        assert_eq!(renders.get(), 1);

        element.disconnect();
        drain_microtasks();

        element.set_property("count", 3).unwrap();
        drain_microtasks();
        // Disconnected: nothing rendered, the update stays pending.
        assert_eq!(renders.get(), 1);
        assert!(element.is_update_pending());

        element.connect(&host);
        drain_microtasks();
        assert_eq!(renders.get(), 2);
        assert!(!element.is_update_pending());
        assert_eq!(element.peek_property("count").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn dispose_stops_all_rendering() {
        let (element, host, renders, _batcher) = setup();
        element.connect(&host);
        drain_microtasks();
        assert_eq!(renders.get(), 1);

        element.dispose();
        element.set_property("count", 9).unwrap();
        drain_microtasks();
        assert_eq!(renders.get(), 1);
    }
}
