// ============================================================================
// spark-element - Element Registry
// Tag-keyed definitions with fatal validation at registration time
// ============================================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::DefineError;

use super::properties::{PropertyDeclaration, PropName};

// =============================================================================
// DEFINITION
// =============================================================================

/// Class-level metadata shared by every instance of an element: its tag and
/// its reactive property declarations.
#[derive(Debug, Clone)]
pub struct ElementDefinition {
    tag: String,
    properties: Vec<PropertyDeclaration>,
}

impl ElementDefinition {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            properties: Vec::new(),
        }
    }

    /// Declare a reactive property.
    pub fn property(mut self, declaration: PropertyDeclaration) -> Self {
        self.properties.push(declaration);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn properties(&self) -> &[PropertyDeclaration] {
        &self.properties
    }

    /// Index of the declaration for `name`.
    pub fn find_property(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    /// Index of the declaration observing `attribute` (matched
    /// case-insensitively, the way attribute names arrive from hosts).
    pub fn find_by_attribute(&self, attribute: &str) -> Option<usize> {
        let wanted = attribute.to_ascii_lowercase();
        self.properties.iter().position(|p| {
            p.attribute_name()
                .is_some_and(|a| a.to_ascii_lowercase() == wanted)
        })
    }

    /// Names of all declared properties, in declaration order.
    pub fn property_names(&self) -> Vec<PropName> {
        self.properties.iter().map(|p| p.name).collect()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

thread_local! {
    static REGISTRY: RefCell<HashMap<String, Rc<ElementDefinition>>> =
        RefCell::new(HashMap::new());
}

/// Register a definition under its tag.
///
/// Registration problems are fatal: a definition with no tag, a tag without
/// a hyphen, or a tag already taken is rejected before any instance can be
/// built from it.
pub fn define(definition: ElementDefinition) -> Result<Rc<ElementDefinition>, DefineError> {
    if definition.tag.is_empty() {
        return Err(DefineError::MissingTag);
    }
    if !definition.tag.contains('-') {
        return Err(DefineError::InvalidTag(definition.tag.clone()));
    }

    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        if registry.contains_key(&definition.tag) {
            return Err(DefineError::DuplicateTag(definition.tag.clone()));
        }
        let definition = Rc::new(definition);
        registry.insert(definition.tag.clone(), definition.clone());
        Ok(definition)
    })
}

/// Look up a registered definition.
pub fn lookup(tag: &str) -> Option<Rc<ElementDefinition>> {
    REGISTRY.with(|registry| registry.borrow().get(tag).cloned())
}

/// Clear all registered definitions. Test hook.
pub fn reset_registry() {
    REGISTRY.with(|registry| registry.borrow_mut().clear());
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTag;

    #[test]
    fn define_and_lookup() {
        reset_registry();

        let defined = define(
            ElementDefinition::new("x-counter")
                .property(PropertyDeclaration::new("count", TypeTag::Number)),
        )
        .expect("valid definition");

        let found = lookup("x-counter").expect("registered");
        assert!(Rc::ptr_eq(&defined, &found));
        assert_eq!(found.find_property("count"), Some(0));
        assert_eq!(found.find_property("missing"), None);
    }

    #[test]
    fn missing_tag_is_fatal() {
        reset_registry();
        assert!(matches!(
            define(ElementDefinition::new("")),
            Err(DefineError::MissingTag)
        ));
    }

    #[test]
    fn tag_without_hyphen_is_fatal() {
        reset_registry();
        assert!(matches!(
            define(ElementDefinition::new("counter")),
            Err(DefineError::InvalidTag(_))
        ));
    }

    #[test]
    fn duplicate_tag_is_fatal() {
        reset_registry();
        define(ElementDefinition::new("x-dup")).unwrap();
        assert!(matches!(
            define(ElementDefinition::new("x-dup")),
            Err(DefineError::DuplicateTag(_))
        ));
    }

    #[test]
    fn attribute_lookup_is_case_insensitive() {
        let definition = ElementDefinition::new("x-item")
            .property(PropertyDeclaration::new("maxItems", TypeTag::Number))
            .property(
                PropertyDeclaration::new("label", TypeTag::String).attribute("data-label"),
            );

        assert_eq!(definition.find_by_attribute("maxitems"), Some(0));
        assert_eq!(definition.find_by_attribute("MAXITEMS"), Some(0));
        assert_eq!(definition.find_by_attribute("data-label"), Some(1));
        assert_eq!(definition.find_by_attribute("label"), None);
    }
}
