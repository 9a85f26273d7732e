// ============================================================================
// spark-element - Container Resolution
// Dependency lookup over the host ancestry
// ============================================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::scheduler::deferred::Deferred;
use crate::scheduler::queue::enqueue_microtask;
use crate::types::Value;

use super::HostNode;

// =============================================================================
// CONTAINER
// =============================================================================

/// A dependency container attached somewhere in the host tree.
///
/// Opaque to the update core: the pipeline only resolves and forwards it.
/// The value map is the minimal surface components need to register and look
/// up shared services.
pub struct Container {
    inner: Rc<RefCell<HashMap<String, Value>>>,
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Container {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Register a value under `key`, replacing any previous entry.
    pub fn provide(&self, key: impl Into<String>, value: Value) {
        self.inner.borrow_mut().insert(key.into(), value);
    }

    /// Look up the value registered under `key`.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.inner.borrow().get(key).cloned()
    }

    /// Identity comparison of handles.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

/// Attach `container` to `node`, making it resolvable from that subtree.
pub fn attach_container(node: &HostNode, container: Container) {
    node.set_container(container);
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Resolve the nearest container by walking ancestors of `node`.
///
/// Resolution is asynchronous: the walk happens on a microtask, after the
/// current turn's tree mutations have landed. When no ancestor carries a
/// container, a fresh one is created at the root and attached there - logged,
/// not fatal, so detached subtrees keep working.
pub fn resolve_container(node: &HostNode) -> Deferred<Container> {
    let deferred = Deferred::new();

    let start = node.clone();
    let result = deferred.clone();
    enqueue_microtask(move || {
        let mut current = start.clone();
        loop {
            if let Some(container) = current.container() {
                result.resolve(container);
                return;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        // `current` is now the root of the tree.
        tracing::debug!(
            root = %current.name(),
            "no container found in host ancestry; creating one at the root"
        );
        let container = Container::new();
        current.set_container(container.clone());
        result.resolve(container);
    });

    deferred
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::queue::drain_microtasks;

    #[test]
    fn resolves_nearest_ancestor_container() {
        let root = HostNode::new("root");
        let middle = HostNode::new("middle");
        let leaf = HostNode::new("leaf");
        root.append_child(&middle);
        middle.append_child(&leaf);

        let near = Container::new();
        near.provide("config", Value::from("near"));
        attach_container(&middle, near.clone());

        let far = Container::new();
        far.provide("config", Value::from("far"));
        attach_container(&root, far);

        let resolved = resolve_container(&leaf);
        assert!(!resolved.is_resolved());

        drain_microtasks();
        let container = resolved.value().expect("resolved after drain");
        assert!(container.ptr_eq(&near));
        assert_eq!(container.lookup("config"), Some(Value::from("near")));
    }

    #[test]
    fn missing_ancestor_creates_container_at_root() {
        let root = HostNode::new("root");
        let leaf = HostNode::new("leaf");
        root.append_child(&leaf);

        let resolved = resolve_container(&leaf);
        drain_microtasks();

        let container = resolved.value().expect("freshly created container");
        // The fallback landed on the root, so siblings resolve to the same
        // container afterwards.
        let sibling = HostNode::new("sibling");
        root.append_child(&sibling);
        let second = resolve_container(&sibling);
        drain_microtasks();
        assert!(second.value().unwrap().ptr_eq(&container));
    }

    #[test]
    fn container_values_round_trip() {
        let container = Container::new();
        assert_eq!(container.lookup("missing"), None);

        container.provide("limit", Value::from(10));
        assert_eq!(container.lookup("limit"), Some(Value::from(10)));
    }
}
