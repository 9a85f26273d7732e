//! Host environment contracts.
//!
//! The update core does not own a document model or a templating engine; it
//! calls into them through the fixed seams in this module:
//!
//! - [`HostNode`] - a minimal parent-linked tree standing in for the hosting
//!   structure (render target, attribute reflection, ancestor traversal)
//! - [`Renderer`] - commits a component's [`Template`] output to a node
//! - [`container`] - dependency resolution over the host ancestry

pub mod container;

pub use container::{attach_container, resolve_container, Container};

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

// =============================================================================
// HOST NODE
// =============================================================================

struct HostNodeInner {
    name: String,
    parent: RefCell<Weak<HostNodeInner>>,
    children: RefCell<Vec<HostNode>>,
    attributes: RefCell<IndexMap<String, String>>,
    content: RefCell<Option<Template>>,
    container: RefCell<Option<Container>>,
}

/// A node in the hosting structure.
///
/// Deliberately small: enough surface for the pipeline to render into,
/// reflect attributes onto, and walk ancestors of. Handles are cheap clones
/// of shared state.
pub struct HostNode {
    inner: Rc<HostNodeInner>,
}

impl Clone for HostNode {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl HostNode {
    /// Create a detached node.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(HostNodeInner {
                name: name.into(),
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                attributes: RefCell::new(IndexMap::new()),
                content: RefCell::new(None),
                container: RefCell::new(None),
            }),
        }
    }

    pub fn name(&self) -> String {
        self.inner.name.clone()
    }

    /// Attach `child` under this node, reparenting it if needed.
    pub fn append_child(&self, child: &HostNode) {
        if let Some(old_parent) = child.parent() {
            old_parent
                .inner
                .children
                .borrow_mut()
                .retain(|c| !c.ptr_eq(child));
        }
        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);
        self.inner.children.borrow_mut().push(child.clone());
    }

    pub fn parent(&self) -> Option<HostNode> {
        self.inner
            .parent
            .borrow()
            .upgrade()
            .map(|inner| HostNode { inner })
    }

    pub fn children(&self) -> Vec<HostNode> {
        self.inner.children.borrow().clone()
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .attributes
            .borrow_mut()
            .insert(name.into(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) {
        self.inner.attributes.borrow_mut().shift_remove(name);
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.attributes.borrow().get(name).cloned()
    }

    /// The last committed render output, if any.
    pub fn content(&self) -> Option<Template> {
        self.inner.content.borrow().clone()
    }

    pub(crate) fn set_content(&self, template: Template) {
        *self.inner.content.borrow_mut() = Some(template);
    }

    pub(crate) fn container(&self) -> Option<Container> {
        self.inner.container.borrow().clone()
    }

    pub(crate) fn set_container(&self, container: Container) {
        *self.inner.container.borrow_mut() = Some(container);
    }

    /// Identity comparison of handles.
    pub fn ptr_eq(&self, other: &HostNode) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

// =============================================================================
// RENDER CONTRACT
// =============================================================================

/// Opaque render output produced by a component's render hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template(pub String);

impl Template {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }
}

/// Options forwarded to the renderer on each commit.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Whether the host is currently attached to the hosting structure.
    pub is_connected: bool,
}

/// Handle to a committed render, retained by the pipeline across commits.
#[derive(Clone)]
pub struct RenderHandle {
    target: HostNode,
}

impl RenderHandle {
    pub fn target(&self) -> &HostNode {
        &self.target
    }
}

/// The external render collaborator.
///
/// Pure with respect to the pipeline: the only observable outcome is the
/// returned handle and whatever the renderer does to the target node.
pub trait Renderer {
    fn render(
        &mut self,
        output: &Template,
        target: &HostNode,
        options: &RenderOptions,
    ) -> RenderHandle;
}

/// Default renderer: commits the template as the node's content.
#[derive(Debug, Default)]
pub struct HostRenderer;

impl Renderer for HostRenderer {
    fn render(
        &mut self,
        output: &Template,
        target: &HostNode,
        _options: &RenderOptions,
    ) -> RenderHandle {
        target.set_content(output.clone());
        RenderHandle {
            target: target.clone(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_links_parent_and_children() {
        let root = HostNode::new("root");
        let child = HostNode::new("child");

        root.append_child(&child);
        assert!(child.parent().unwrap().ptr_eq(&root));
        assert_eq!(root.children().len(), 1);

        // Reparenting removes the old link.
        let other = HostNode::new("other");
        other.append_child(&child);
        assert!(child.parent().unwrap().ptr_eq(&other));
        assert!(root.children().is_empty());
    }

    #[test]
    fn attributes_round_trip() {
        let node = HostNode::new("x-item");
        node.set_attribute("count", "3");
        assert_eq!(node.attribute("count"), Some("3".to_string()));

        node.remove_attribute("count");
        assert_eq!(node.attribute("count"), None);
    }

    #[test]
    fn host_renderer_commits_content() {
        let node = HostNode::new("x-item");
        let mut renderer = HostRenderer;

        let handle = renderer.render(
            &Template::new("<p>hi</p>"),
            &node,
            &RenderOptions::default(),
        );

        assert!(handle.target().ptr_eq(&node));
        assert_eq!(node.content(), Some(Template::new("<p>hi</p>")));
    }
}
